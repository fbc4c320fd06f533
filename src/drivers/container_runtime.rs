use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized container status. The source backends this crate talks to
/// report their own dialects ("running", "Up 3 minutes", "dead", ...); the
/// driver implementation is responsible for translating into this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Running,
    Healthy,
    Exited,
    Dead,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    pub health: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Container Runtime driver (spec §6). Implementations back this with
/// Docker, a Compose CLI wrapper, or any orchestrator; the core only ever
/// talks through this trait.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn start_project(&self, name: &str, topology: &Value) -> anyhow::Result<()>;
    async fn stop_project(&self, name: &str) -> anyhow::Result<()>;
    async fn remove_project(&self, name: &str) -> anyhow::Result<()>;

    async fn start_service(&self, project: &str, service: &str, spec: &Value) -> anyhow::Result<String>;
    async fn stop_container(&self, id: &str) -> anyhow::Result<()>;
    async fn remove_container(&self, id: &str) -> anyhow::Result<()>;
    /// Restart a container in place, preserving its id (spec.md §4.2 "Heal"
    /// step 4 refers to this as `StartContainer`; kept as a distinct op from
    /// `start_service` since the supervisor only ever holds a container id,
    /// not the service spec needed to recreate one from scratch).
    async fn restart_container(&self, id: &str) -> anyhow::Result<()>;

    async fn get_service_containers(&self, project: &str, service: &str) -> anyhow::Result<Vec<String>>;
    async fn get_container_status(&self, id: &str) -> anyhow::Result<ContainerStatus>;
    async fn get_container_info(&self, id: &str) -> anyhow::Result<ContainerInfo>;
}
