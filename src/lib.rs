pub mod backup;
pub mod catalog;
pub mod certificate;
pub mod crypto;
pub mod db;
pub mod deployment;
pub mod drivers;
pub mod error;
pub mod events;
pub mod settings;
pub mod state;
pub mod supervisor;
pub mod tenant;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use backup::BackupController;
use catalog::ResourceCatalog;
use certificate::{CertificateController, RenewalScanner};
use deployment::DeploymentController;
use settings::Settings;
use state::CoreState;
use supervisor::Supervisor;

/// Everything spawned by [`run`], kept around so callers embedding this
/// crate (rather than running it as the standalone `opslane-coreutil`
/// binary) can reach the same controllers the background loops use.
pub struct Core {
    pub state: Arc<CoreState>,
    pub catalog: Arc<ResourceCatalog>,
    pub deployment: Arc<DeploymentController>,
    pub supervisor: Arc<Supervisor>,
    pub backup: Arc<BackupController>,
    pub certificate: Arc<CertificateController>,
}

/// Assembles the core against already-constructed driver collaborators and
/// starts every background loop (deployment reconcile, self-healing
/// monitor, retention sweep, certificate renewal scan). Collapsed into one
/// entry point since this crate has no HTTP surface of its own (spec.md §1
/// non-goals) — the surface that authenticates callers and exposes these
/// operations over a wire protocol lives outside this crate.
pub fn start(state: Arc<CoreState>) -> Core {
    let catalog = ResourceCatalog::new(state.db_pool.clone());

    let supervisor = Arc::new(Supervisor::new(state.clone()));
    supervisor.clone().start();
    info!("self-healing supervisor started");

    let deployment = Arc::new(DeploymentController::new(state.clone(), supervisor.clone()));
    deployment.clone().start();
    info!("deployment controller started");

    let backup = Arc::new(BackupController::new(state.clone()));
    backup.clone().start();
    info!("backup controller started");

    let certificate = Arc::new(CertificateController::new(state.clone()));
    let renewal = Arc::new(RenewalScanner::new(state.clone(), certificate.clone()));
    renewal.start();
    info!("certificate renewal scanner started");

    Core {
        state,
        catalog,
        deployment,
        supervisor,
        backup,
        certificate,
    }
}

/// Loads configuration, connects to Postgres, runs pending migrations, and
/// waits for a shutdown signal. Drivers (container runtime, storage
/// backend, source drivers, notifier, traffic router) are supplied by the
/// caller since this crate only defines their trait boundaries (spec.md
/// §6) — concrete implementations live outside it.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    settings: Settings,
    container_runtime: Arc<dyn drivers::ContainerRuntime>,
    storage_backend: Arc<dyn drivers::StorageBackend>,
    source_drivers: Arc<dyn state::SourceDriverRegistry>,
    notifier: Arc<dyn drivers::Notifier>,
    traffic_router: Option<Arc<dyn drivers::TrafficRouter>>,
    key_encryptor: Option<Arc<crypto::KeyEncryptor>>,
) -> Result<()> {
    let pool = db::connect(&settings.database.url, settings.database.max_connections).await?;
    db::run_migrations(&pool).await?;

    let event_bus = Arc::new(events::InMemoryEventBus::default());
    let state = Arc::new(CoreState::new(
        pool,
        settings,
        container_runtime,
        storage_backend,
        source_drivers,
        notifier,
        traffic_router,
        key_encryptor,
        event_bus,
    ));

    let _core = start(state);

    shutdown_signal().await;
    info!("shutdown signal received, draining background loops");

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down gracefully"),
        _ = terminate => info!("received SIGTERM, shutting down gracefully"),
    }
}
