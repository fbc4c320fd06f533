use async_trait::async_trait;
use serde_json::Value;

use crate::db::models::BackupPolicy;

/// Source Driver (spec §6): one implementation per `source_type` (e.g.
/// postgres, filesystem volume). `Snapshot` produces a local artifact;
/// `Restore` applies one back against `target`.
#[async_trait]
pub trait SourceDriver: Send + Sync {
    async fn snapshot(&self, policy: &BackupPolicy) -> anyhow::Result<String>;
    async fn restore(&self, local_path: &str, target: &Value) -> anyhow::Result<()>;
}
