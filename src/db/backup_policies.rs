use anyhow::{Context, Result};
use uuid::Uuid;

use crate::db::models::{BackupPolicy, BackupSourceType};
use crate::error::CoreResult;
use crate::tenant::TenantContext;

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &sqlx::PgPool,
    ctx: &TenantContext,
    source_type: BackupSourceType,
    source_config: serde_json::Value,
    storage_type: &str,
    storage_config: serde_json::Value,
    schedule_cron: &str,
    retention_days: i32,
    compression: bool,
    encryption: bool,
) -> CoreResult<BackupPolicy> {
    let policy = sqlx::query_as::<_, BackupPolicy>(
        r#"
        INSERT INTO backup_policies
            (id, tenant_id, owner_id, source_type, source_config, storage_type, storage_config,
             schedule_cron, retention_days, compression, encryption, enabled, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, true, now(), now())
        RETURNING id, tenant_id, owner_id, source_type, source_config, storage_type, storage_config,
                  schedule_cron, retention_days, compression, encryption, enabled, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(ctx.owner_id)
    .bind(source_type)
    .bind(source_config)
    .bind(storage_type)
    .bind(storage_config)
    .bind(schedule_cron)
    .bind(retention_days)
    .bind(compression)
    .bind(encryption)
    .fetch_one(pool)
    .await?;

    Ok(policy)
}

pub async fn find_by_id(
    pool: &sqlx::PgPool,
    ctx: &TenantContext,
    id: Uuid,
) -> Result<Option<BackupPolicy>> {
    let policy = sqlx::query_as::<_, BackupPolicy>(
        r#"
        SELECT id, tenant_id, owner_id, source_type, source_config, storage_type, storage_config,
               schedule_cron, retention_days, compression, encryption, enabled, created_at, updated_at
        FROM backup_policies
        WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(id)
    .bind(ctx.tenant_id)
    .fetch_optional(pool)
    .await
    .context("failed to find backup policy")?;

    Ok(policy)
}

/// All enabled policies across every tenant, for the scheduled retention
/// sweep loop — which runs as a system actor with no single tenant context.
pub async fn list_all_enabled(pool: &sqlx::PgPool) -> Result<Vec<BackupPolicy>> {
    let policies = sqlx::query_as::<_, BackupPolicy>(
        r#"
        SELECT id, tenant_id, owner_id, source_type, source_config, storage_type, storage_config,
               schedule_cron, retention_days, compression, encryption, enabled, created_at, updated_at
        FROM backup_policies
        WHERE enabled = true
        "#,
    )
    .fetch_all(pool)
    .await
    .context("failed to list enabled backup policies")?;

    Ok(policies)
}

pub async fn list(pool: &sqlx::PgPool, ctx: &TenantContext) -> Result<Vec<BackupPolicy>> {
    let policies = sqlx::query_as::<_, BackupPolicy>(
        r#"
        SELECT id, tenant_id, owner_id, source_type, source_config, storage_type, storage_config,
               schedule_cron, retention_days, compression, encryption, enabled, created_at, updated_at
        FROM backup_policies
        WHERE tenant_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(ctx.tenant_id)
    .fetch_all(pool)
    .await
    .context("failed to list backup policies")?;

    Ok(policies)
}
