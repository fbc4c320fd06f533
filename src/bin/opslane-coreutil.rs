use opslane_core::settings::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Administrative entry point: loads configuration, connects to Postgres,
/// and runs pending migrations. Starting the background controllers
/// against real drivers (container runtime, object store, ACME client,
/// notifier, traffic router) is left to the application that embeds this
/// crate, since this crate only defines those collaborators' trait
/// boundaries (spec.md §6) and ships no concrete implementation of them.
#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(err) = run_migrations(&settings).await {
        tracing::error!(error = %err, "migration run failed");
        std::process::exit(1);
    }

    tracing::info!("migrations up to date; start controllers from an embedding application with concrete drivers wired in");
}

async fn run_migrations(settings: &Settings) -> anyhow::Result<()> {
    let pool = opslane_core::db::connect(&settings.database.url, settings.database.max_connections).await?;
    opslane_core::db::run_migrations(&pool).await
}
