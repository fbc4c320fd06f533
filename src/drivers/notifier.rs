use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub container_id: Option<String>,
    pub service_name: Option<String>,
    pub project_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub details: Value,
}

/// Notifier driver (spec §6): alert fan-out to email/webhook/chat backends.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert(&self, alert: Alert) -> anyhow::Result<()>;
}
