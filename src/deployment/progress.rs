use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::deployment_events;
use crate::events::{Event, EventBus, JobKind};

/// Sink for progress milestones a strategy reports while it runs. Decouples
/// the strategy algorithms (spec.md §4.1) from how progress is persisted and
/// published — tests can swap in an in-memory sink.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: i32, message: &str) -> anyhow::Result<()>;
    async fn event(&self, event_type: &str, service_name: Option<&str>, message: &str, details: serde_json::Value) -> anyhow::Result<()>;
}

pub struct DbProgressSink {
    pool: PgPool,
    deployment_id: Uuid,
    event_bus: Arc<dyn EventBus>,
}

impl DbProgressSink {
    pub fn new(pool: PgPool, deployment_id: Uuid, event_bus: Arc<dyn EventBus>) -> Self {
        Self { pool, deployment_id, event_bus }
    }
}

#[async_trait]
impl ProgressSink for DbProgressSink {
    async fn report(&self, progress: i32, message: &str) -> anyhow::Result<()> {
        crate::db::deployments::update_progress(&self.pool, self.deployment_id, progress, Some(message)).await?;
        self.event("progress", None, message, serde_json::json!({ "progress": progress })).await
    }

    async fn event(&self, event_type: &str, service_name: Option<&str>, message: &str, details: serde_json::Value) -> anyhow::Result<()> {
        deployment_events::append(
            &self.pool,
            self.deployment_id,
            event_type,
            service_name,
            message,
            details.clone(),
        )
        .await?;

        self.event_bus.publish(Event {
            job_kind: JobKind::Deployment,
            job_id: self.deployment_id,
            event_type: event_type.to_string(),
            message: message.to_string(),
            details,
            occurred_at: chrono::Utc::now(),
        });

        Ok(())
    }
}

/// Records reports/events in memory instead of persisting them, so strategy
/// tests can assert on emitted event order without a database.
#[cfg(any(test, feature = "testing"))]
#[derive(Default)]
pub struct RecordingProgressSink {
    pub reports: std::sync::Mutex<Vec<(i32, String)>>,
    pub events: std::sync::Mutex<Vec<(String, Option<String>, String)>>,
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl ProgressSink for RecordingProgressSink {
    async fn report(&self, progress: i32, message: &str) -> anyhow::Result<()> {
        self.reports.lock().unwrap().push((progress, message.to_string()));
        Ok(())
    }

    async fn event(&self, event_type: &str, service_name: Option<&str>, message: &str, _details: serde_json::Value) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((event_type.to_string(), service_name.map(str::to_string), message.to_string()));
        Ok(())
    }
}
