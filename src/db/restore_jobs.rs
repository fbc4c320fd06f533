use anyhow::{Context, Result};
use uuid::Uuid;

use crate::db::models::{JobStatus, RestoreJob};
use crate::tenant::TenantContext;

pub async fn create(
    pool: &sqlx::PgPool,
    ctx: &TenantContext,
    backup_job_id: Uuid,
    target: serde_json::Value,
) -> Result<RestoreJob> {
    let job = sqlx::query_as::<_, RestoreJob>(
        r#"
        INSERT INTO restore_jobs
            (id, tenant_id, backup_job_id, target, status, start_time, end_time, error_message)
        VALUES ($1, $2, $3, $4, $5, now(), NULL, NULL)
        RETURNING id, tenant_id, backup_job_id, target, status, start_time, end_time, error_message
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(backup_job_id)
    .bind(target)
    .bind(JobStatus::Running)
    .fetch_one(pool)
    .await
    .context("failed to create restore job")?;

    Ok(job)
}

pub async fn mark_completed(pool: &sqlx::PgPool, id: Uuid) -> Result<RestoreJob> {
    let job = sqlx::query_as::<_, RestoreJob>(
        r#"
        UPDATE restore_jobs SET status = $2, end_time = now() WHERE id = $1
        RETURNING id, tenant_id, backup_job_id, target, status, start_time, end_time, error_message
        "#,
    )
    .bind(id)
    .bind(JobStatus::Completed)
    .fetch_one(pool)
    .await
    .context("failed to mark restore job completed")?;

    Ok(job)
}

pub async fn mark_failed(pool: &sqlx::PgPool, id: Uuid, error_message: &str) -> Result<RestoreJob> {
    let job = sqlx::query_as::<_, RestoreJob>(
        r#"
        UPDATE restore_jobs SET status = $2, end_time = now(), error_message = $3 WHERE id = $1
        RETURNING id, tenant_id, backup_job_id, target, status, start_time, end_time, error_message
        "#,
    )
    .bind(id)
    .bind(JobStatus::Failed)
    .bind(error_message)
    .fetch_one(pool)
    .await
    .context("failed to mark restore job failed")?;

    Ok(job)
}

pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<RestoreJob>> {
    let job = sqlx::query_as::<_, RestoreJob>(
        r#"
        SELECT id, tenant_id, backup_job_id, target, status, start_time, end_time, error_message
        FROM restore_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to find restore job")?;

    Ok(job)
}
