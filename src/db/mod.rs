pub mod backup_jobs;
pub mod backup_policies;
pub mod certificates;
pub mod deployment_events;
pub mod deployments;
pub mod failure_records;
pub mod models;
pub mod projects;
pub mod restore_jobs;
pub mod service_instances;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to the Postgres-backed persistence layer.
///
/// Table-name contracts (spec.md §6): `compose_projects`, `deployments`,
/// `service_instances`, `deployment_events`, `container_failure_records`,
/// `backup_policies`, `backup_jobs`, `restore_jobs`, `ssl_certs`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    tracing::info!(
        "Connecting to PostgreSQL with {} max connections...",
        max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    tracing::info!("Successfully connected to PostgreSQL");
    Ok(pool)
}

/// Run pending migrations against the connected pool.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations completed successfully");
    Ok(())
}
