use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{BackupJob, JobStatus};
use crate::tenant::TenantContext;

pub async fn create(pool: &sqlx::PgPool, ctx: &TenantContext, policy_id: Uuid) -> Result<BackupJob> {
    let job = sqlx::query_as::<_, BackupJob>(
        r#"
        INSERT INTO backup_jobs
            (id, tenant_id, policy_id, status, file_path, file_size, checksum,
             start_time, end_time, duration_seconds, error_message, created_at)
        VALUES ($1, $2, $3, $4, NULL, 0, NULL, now(), NULL, NULL, NULL, now())
        RETURNING id, tenant_id, policy_id, status, file_path, file_size, checksum,
                  start_time, end_time, duration_seconds, error_message, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(policy_id)
    .bind(JobStatus::Running)
    .fetch_one(pool)
    .await
    .context("failed to create backup job")?;

    Ok(job)
}

pub async fn mark_completed(
    pool: &sqlx::PgPool,
    id: Uuid,
    file_path: &str,
    file_size: i64,
    checksum: &str,
) -> Result<BackupJob> {
    let job = sqlx::query_as::<_, BackupJob>(
        r#"
        UPDATE backup_jobs
        SET status = $2, file_path = $3, file_size = $4, checksum = $5, end_time = now(),
            duration_seconds = EXTRACT(EPOCH FROM (now() - start_time))::bigint
        WHERE id = $1
        RETURNING id, tenant_id, policy_id, status, file_path, file_size, checksum,
                  start_time, end_time, duration_seconds, error_message, created_at
        "#,
    )
    .bind(id)
    .bind(JobStatus::Completed)
    .bind(file_path)
    .bind(file_size)
    .bind(checksum)
    .fetch_one(pool)
    .await
    .context("failed to mark backup job completed")?;

    Ok(job)
}

pub async fn mark_failed(pool: &sqlx::PgPool, id: Uuid, error_message: &str) -> Result<BackupJob> {
    let job = sqlx::query_as::<_, BackupJob>(
        r#"
        UPDATE backup_jobs
        SET status = $2, error_message = $3, end_time = now(),
            duration_seconds = EXTRACT(EPOCH FROM (now() - start_time))::bigint
        WHERE id = $1
        RETURNING id, tenant_id, policy_id, status, file_path, file_size, checksum,
                  start_time, end_time, duration_seconds, error_message, created_at
        "#,
    )
    .bind(id)
    .bind(JobStatus::Failed)
    .bind(error_message)
    .fetch_one(pool)
    .await
    .context("failed to mark backup job failed")?;

    Ok(job)
}

pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<BackupJob>> {
    let job = sqlx::query_as::<_, BackupJob>(
        r#"
        SELECT id, tenant_id, policy_id, status, file_path, file_size, checksum,
               start_time, end_time, duration_seconds, error_message, created_at
        FROM backup_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to find backup job")?;

    Ok(job)
}

/// Completed jobs for a policy older than the retention horizon (spec.md
/// §4.3 "SweepRetention").
pub async fn find_expired_completed(
    pool: &sqlx::PgPool,
    policy_id: Uuid,
    older_than: DateTime<Utc>,
) -> Result<Vec<BackupJob>> {
    let jobs = sqlx::query_as::<_, BackupJob>(
        r#"
        SELECT id, tenant_id, policy_id, status, file_path, file_size, checksum,
               start_time, end_time, duration_seconds, error_message, created_at
        FROM backup_jobs
        WHERE policy_id = $1 AND status = 'completed' AND created_at < $2
        "#,
    )
    .bind(policy_id)
    .bind(older_than)
    .fetch_all(pool)
    .await
    .context("failed to find expired backup jobs")?;

    Ok(jobs)
}

pub async fn delete(pool: &sqlx::PgPool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM backup_jobs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete backup job")?;
    Ok(())
}

pub async fn list_for_policy(pool: &sqlx::PgPool, policy_id: Uuid) -> Result<Vec<BackupJob>> {
    let jobs = sqlx::query_as::<_, BackupJob>(
        r#"
        SELECT id, tenant_id, policy_id, status, file_path, file_size, checksum,
               start_time, end_time, duration_seconds, error_message, created_at
        FROM backup_jobs
        WHERE policy_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(policy_id)
    .fetch_all(pool)
    .await
    .context("failed to list backup jobs for policy")?;

    Ok(jobs)
}
