use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Which long-running job kind an event belongs to (spec.md §2 "Event &
/// Progress Bus": "append-only event log per long-running job"). Deployments
/// persist their own history in `deployment_events`; the other job kinds
/// have no durable event table in the contracted schema, so the bus is
/// their only event trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Deployment,
    Backup,
    Restore,
    Certificate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub job_kind: JobKind,
    pub job_id: Uuid,
    pub event_type: String,
    pub message: String,
    pub details: Value,
    pub occurred_at: DateTime<Utc>,
}

/// Publish side of the bus. Deployment progress persistence
/// (`deployment::progress::DbProgressSink`) publishes here in addition to
/// writing `deployment_events`, so a live watcher sees progress without
/// polling the store.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: Event);
    fn subscribe(&self) -> broadcast::Receiver<Event>;
}

/// Fan-out bus backed by a bounded broadcast channel. Lagging subscribers
/// drop old events rather than block publishers — this is a best-effort
/// live feed, not the durable record (that's `db::deployment_events` for
/// deployments).
pub struct InMemoryEventBus {
    sender: broadcast::Sender<Event>,
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: Event) {
        // No active subscribers is the common case (no API layer attached);
        // the send error just means nobody's listening.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_published_events() {
        let bus = InMemoryEventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(Event {
            job_kind: JobKind::Deployment,
            job_id: Uuid::new_v4(),
            event_type: "progress".to_string(),
            message: "starting".to_string(),
            details: serde_json::json!({}),
            occurred_at: Utc::now(),
        });

        let received = rx.try_recv().unwrap();
        assert_eq!(received.event_type, "progress");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = InMemoryEventBus::new(8);
        bus.publish(Event {
            job_kind: JobKind::Backup,
            job_id: Uuid::new_v4(),
            event_type: "completed".to_string(),
            message: "done".to_string(),
            details: serde_json::json!({}),
            occurred_at: Utc::now(),
        });
    }
}
