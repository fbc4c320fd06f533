use anyhow::{Context, Result};
use uuid::Uuid;

use crate::db::models::DeploymentEvent;

/// Append an event. Events are never mutated or reordered — ordering is
/// insertion order, enforced by `ORDER BY created_at, id` on read (spec.md
/// §5 "Ordering guarantees").
pub async fn append(
    pool: &sqlx::PgPool,
    deployment_id: Uuid,
    event_type: &str,
    service_name: Option<&str>,
    message: &str,
    details: serde_json::Value,
) -> Result<DeploymentEvent> {
    let event = sqlx::query_as::<_, DeploymentEvent>(
        r#"
        INSERT INTO deployment_events (id, deployment_id, event_type, service_name, message, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, now())
        RETURNING id, deployment_id, event_type, service_name, message, details, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(deployment_id)
    .bind(event_type)
    .bind(service_name)
    .bind(message)
    .bind(details)
    .fetch_one(pool)
    .await
    .context("failed to append deployment event")?;

    Ok(event)
}

pub async fn list_for_deployment(
    pool: &sqlx::PgPool,
    deployment_id: Uuid,
) -> Result<Vec<DeploymentEvent>> {
    let events = sqlx::query_as::<_, DeploymentEvent>(
        r#"
        SELECT id, deployment_id, event_type, service_name, message, details, created_at
        FROM deployment_events
        WHERE deployment_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(deployment_id)
    .fetch_all(pool)
    .await
    .context("failed to list deployment events")?;

    Ok(events)
}
