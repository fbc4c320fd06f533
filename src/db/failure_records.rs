use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::db::models::{ActionResult, FailureRecord, HealAction};
use crate::tenant::TenantContext;

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &sqlx::PgPool,
    ctx: &TenantContext,
    container_id: &str,
    failure_type: &str,
    error_message: &str,
    details: serde_json::Value,
    action: HealAction,
) -> Result<FailureRecord> {
    let record = sqlx::query_as::<_, FailureRecord>(
        r#"
        INSERT INTO container_failure_records
            (id, tenant_id, container_id, failure_type, error_message, details, action, action_result, detected_at, resolved_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), NULL)
        RETURNING id, tenant_id, container_id, failure_type, error_message, details, action, action_result, detected_at, resolved_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(container_id)
    .bind(failure_type)
    .bind(error_message)
    .bind(details)
    .bind(action)
    .bind(ActionResult::Pending)
    .fetch_one(pool)
    .await
    .context("failed to create failure record")?;

    Ok(record)
}

/// Patch the most recently detected `pending` record for a container once
/// healing has run (spec.md §4.2 "Heal" steps 4/5).
pub async fn patch_latest_pending(
    pool: &sqlx::PgPool,
    container_id: &str,
    result: ActionResult,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE container_failure_records
        SET action_result = $2
        WHERE id = (
            SELECT id FROM container_failure_records
            WHERE container_id = $1 AND action_result = 'pending'
            ORDER BY detected_at DESC, id DESC
            LIMIT 1
        )
        "#,
    )
    .bind(container_id)
    .bind(result)
    .execute(pool)
    .await
    .context("failed to patch latest pending failure record")?;

    Ok(())
}

/// Resolve every open (`resolved_at IS NULL`) record for a container — the
/// healthy-path transition of spec.md §4.2.
pub async fn resolve_open(pool: &sqlx::PgPool, container_id: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE container_failure_records
        SET resolved_at = $2
        WHERE container_id = $1 AND resolved_at IS NULL
        "#,
    )
    .bind(container_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("failed to resolve open failure records")?;

    Ok(result.rows_affected())
}

/// Newest-first, bounded — spec.md §4.2 `GetFailures(container_id, limit)`.
pub async fn list_for_container(
    pool: &sqlx::PgPool,
    container_id: &str,
    limit: i64,
) -> Result<Vec<FailureRecord>> {
    let records = sqlx::query_as::<_, FailureRecord>(
        r#"
        SELECT id, tenant_id, container_id, failure_type, error_message, details, action, action_result, detected_at, resolved_at
        FROM container_failure_records
        WHERE container_id = $1
        ORDER BY detected_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(container_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list failure records for container")?;

    Ok(records)
}
