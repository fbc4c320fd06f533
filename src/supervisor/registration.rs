use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use uuid::Uuid;

use crate::db::models::{HealingConfig, HealingRegistration};

/// Read-mostly set of watched containers. Readers hold the set-level lock
/// only long enough to snapshot; register/unregister take it exclusively
/// (spec.md §4.2, §5 "Shared-resource policy").
///
/// Each container additionally gets its own lock so the monitor loop can
/// serialize state mutation and the driver call sequence within `Heal`
/// per-container, without blocking unrelated containers (spec.md §9 design
/// note).
#[derive(Default)]
pub struct RegistrationSet {
    inner: RwLock<HashMap<String, Arc<Mutex<HealingRegistration>>>>,
}

impl RegistrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, tenant_id: Uuid, container_id: &str, config: HealingConfig) {
        let registration = Arc::new(Mutex::new(HealingRegistration::new(tenant_id, container_id, config)));
        self.inner.write().await.insert(container_id.to_string(), registration);
    }

    pub async fn unregister(&self, container_id: &str) {
        self.inner.write().await.remove(container_id);
    }

    pub async fn get(&self, container_id: &str) -> Option<Arc<Mutex<HealingRegistration>>> {
        self.inner.read().await.get(container_id).cloned()
    }

    /// Snapshot of every registered entry, holding the set-level lock only
    /// long enough to clone the `Arc`s (spec.md §4.2 "Monitor loop").
    pub async fn snapshot(&self) -> Vec<(String, Arc<Mutex<HealingRegistration>>)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(id, reg)| (id.clone(), reg.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let set = RegistrationSet::new();
        set.register(Uuid::new_v4(), "c1", HealingConfig::default()).await;
        assert!(set.get("c1").await.is_some());
        assert!(set.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn unregister_removes_entry() {
        let set = RegistrationSet::new();
        set.register(Uuid::new_v4(), "c1", HealingConfig::default()).await;
        set.unregister("c1").await;
        assert!(set.get("c1").await.is_none());
    }

    #[tokio::test]
    async fn snapshot_reflects_current_registrations() {
        let set = RegistrationSet::new();
        let tenant_id = Uuid::new_v4();
        set.register(tenant_id, "c1", HealingConfig::default()).await;
        set.register(tenant_id, "c2", HealingConfig::default()).await;
        let snapshot = set.snapshot().await;
        assert_eq!(snapshot.len(), 2);
    }
}
