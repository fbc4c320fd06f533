use async_trait::async_trait;
use serde_json::Value;

/// Storage Backend driver (spec §6): object storage for backup artifacts.
/// `config` is an opaque key-value bag whose recognized keys are defined by
/// each driver implementation, not by the core.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn upload(&self, local_path: &str, config: &Value) -> anyhow::Result<String>;
    async fn download(&self, remote_path: &str, local_path: &str, config: &Value) -> anyhow::Result<()>;
    async fn delete(&self, remote_path: &str, config: &Value) -> anyhow::Result<()>;
    async fn exists(&self, remote_path: &str, config: &Value) -> anyhow::Result<bool>;
    async fn list(&self, prefix: &str, config: &Value) -> anyhow::Result<Vec<String>>;
}
