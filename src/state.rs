use std::sync::Arc;

use sqlx::PgPool;

use crate::crypto::KeyEncryptor;
use crate::drivers::{ContainerRuntime, Notifier, SourceDriver, StorageBackend, TrafficRouter};
use crate::events::EventBus;
use crate::settings::Settings;

/// Shared state handed to every controller and background loop: the
/// database pool plus the driver collaborators the core is wired against
/// (spec.md §6).
#[derive(Clone)]
pub struct CoreState {
    pub db_pool: PgPool,
    pub settings: Arc<Settings>,
    pub container_runtime: Arc<dyn ContainerRuntime>,
    pub storage_backend: Arc<dyn StorageBackend>,
    pub source_drivers: Arc<dyn SourceDriverRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub traffic_router: Option<Arc<dyn TrafficRouter>>,
    /// At-rest encryption for `ssl_certs.key_pem`; absent means the store
    /// keeps private keys in plaintext (acceptable for local/dev configs
    /// but flagged in `DESIGN.md`).
    pub key_encryptor: Option<Arc<KeyEncryptor>>,
    pub event_bus: Arc<dyn EventBus>,
}

/// Resolves the Source Driver for a given `BackupSourceType` (spec.md §6:
/// "Source Driver: per source type"). A registry rather than a single trait
/// object because backup policies select their driver by source type.
pub trait SourceDriverRegistry: Send + Sync {
    fn resolve(&self, source_type: crate::db::models::BackupSourceType) -> Option<Arc<dyn SourceDriver>>;
}

impl CoreState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: PgPool,
        settings: Settings,
        container_runtime: Arc<dyn ContainerRuntime>,
        storage_backend: Arc<dyn StorageBackend>,
        source_drivers: Arc<dyn SourceDriverRegistry>,
        notifier: Arc<dyn Notifier>,
        traffic_router: Option<Arc<dyn TrafficRouter>>,
        key_encryptor: Option<Arc<KeyEncryptor>>,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            db_pool,
            settings: Arc::new(settings),
            container_runtime,
            storage_backend,
            source_drivers,
            notifier,
            traffic_router,
            key_encryptor,
            event_bus,
        }
    }
}
