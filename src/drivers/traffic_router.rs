use async_trait::async_trait;

/// Traffic Router driver (spec §6), optional — only required for blue/green
/// deployments. `Swap` returns an opaque binding token that `Restore` can
/// hand back to undo the swap on rollback.
#[async_trait]
pub trait TrafficRouter: Send + Sync {
    async fn swap(&self, from_project: &str, to_project: &str) -> anyhow::Result<String>;
    async fn restore(&self, previous_binding: &str) -> anyhow::Result<()>;

    /// Picks up a renewed certificate (spec.md §4.4 "Scheduled scan" step:
    /// "reload the traffic router"). A no-op for routers that read cert
    /// files fresh on every connection.
    async fn reload(&self) -> anyhow::Result<()>;
}
