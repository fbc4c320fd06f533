use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Deployment, DeploymentStatus, DeploymentStrategy};
use crate::deployment::state_machine;
use crate::error::{CoreError, CoreResult};
use crate::tenant::TenantContext;

/// Assign the next version string for a project: `"v" + unix_timestamp_seconds`,
/// with a `-N` counter suffix if two `Deploy` calls land on the same second
/// (spec.md §4.1 "Version assignment").
pub async fn next_version(pool: &PgPool, ctx: &TenantContext, project_id: Uuid) -> Result<String> {
    let base = format!("v{}", Utc::now().timestamp());

    let existing: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT version FROM deployments
        WHERE tenant_id = $1 AND project_id = $2 AND version LIKE $3
        "#,
    )
    .bind(ctx.tenant_id)
    .bind(project_id)
    .bind(format!("{base}%"))
    .fetch_all(pool)
    .await
    .context("failed to scan existing deployment versions")?;

    if !existing.iter().any(|v| v == &base) {
        return Ok(base);
    }

    let mut counter = 1;
    loop {
        let candidate = format!("{base}-{counter}");
        if !existing.iter().any(|v| v == &candidate) {
            return Ok(candidate);
        }
        counter += 1;
    }
}

pub async fn create(
    pool: &PgPool,
    ctx: &TenantContext,
    project_id: Uuid,
    version: &str,
    strategy: DeploymentStrategy,
) -> Result<Deployment> {
    let deployment = sqlx::query_as::<_, Deployment>(
        r#"
        INSERT INTO deployments
            (id, tenant_id, owner_id, project_id, version, strategy, status, progress,
             message, rollback_target_version, started_at, completed_at, created_at, updated_at)
        VALUES
            ($1, $2, $3, $4, $5, $6, $7, 0, NULL, NULL, NULL, NULL, now(), now())
        RETURNING id, tenant_id, owner_id, project_id, version, strategy, status, progress,
                  message, rollback_target_version, started_at, completed_at, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(ctx.owner_id)
    .bind(project_id)
    .bind(version)
    .bind(strategy)
    .bind(DeploymentStatus::Pending)
    .fetch_one(pool)
    .await
    .context("failed to create deployment")?;

    Ok(deployment)
}

pub async fn find_by_id(pool: &PgPool, ctx: &TenantContext, id: Uuid) -> Result<Option<Deployment>> {
    let deployment = sqlx::query_as::<_, Deployment>(
        r#"
        SELECT id, tenant_id, owner_id, project_id, version, strategy, status, progress,
               message, rollback_target_version, started_at, completed_at, created_at, updated_at
        FROM deployments
        WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(id)
    .bind(ctx.tenant_id)
    .fetch_optional(pool)
    .await
    .context("failed to find deployment by id")?;

    Ok(deployment)
}

pub async fn list_for_project(
    pool: &PgPool,
    ctx: &TenantContext,
    project_id: Uuid,
) -> Result<Vec<Deployment>> {
    let deployments = sqlx::query_as::<_, Deployment>(
        r#"
        SELECT id, tenant_id, owner_id, project_id, version, strategy, status, progress,
               message, rollback_target_version, started_at, completed_at, created_at, updated_at
        FROM deployments
        WHERE tenant_id = $1 AND project_id = $2
        ORDER BY created_at ASC
        "#,
    )
    .bind(ctx.tenant_id)
    .bind(project_id)
    .fetch_all(pool)
    .await
    .context("failed to list deployments for project")?;

    Ok(deployments)
}

/// Deployments currently eligible for worker processing or monitoring.
pub async fn find_non_terminal(pool: &PgPool, limit: i64) -> Result<Vec<Deployment>> {
    let deployments = sqlx::query_as::<_, Deployment>(
        r#"
        SELECT id, tenant_id, owner_id, project_id, version, strategy, status, progress,
               message, rollback_target_version, started_at, completed_at, created_at, updated_at
        FROM deployments
        WHERE status IN ('pending', 'in_progress', 'rolling_back')
        ORDER BY created_at ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to find non-terminal deployments")?;

    Ok(deployments)
}

/// Most recent `completed` deployment for the project with a lower id than
/// `before_id` — the rollback target search of spec.md §4.1 "Failure handling".
pub async fn find_rollback_target(
    pool: &PgPool,
    ctx: &TenantContext,
    project_id: Uuid,
    before_id: Uuid,
) -> Result<Option<Deployment>> {
    let deployment = sqlx::query_as::<_, Deployment>(
        r#"
        SELECT id, tenant_id, owner_id, project_id, version, strategy, status, progress,
               message, rollback_target_version, started_at, completed_at, created_at, updated_at
        FROM deployments
        WHERE tenant_id = $1 AND project_id = $2 AND status = 'completed' AND id <> $3
          AND created_at < (SELECT created_at FROM deployments WHERE id = $3)
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(ctx.tenant_id)
    .bind(project_id)
    .bind(before_id)
    .fetch_optional(pool)
    .await
    .context("failed to find rollback target")?;

    Ok(deployment)
}

async fn transition(
    pool: &PgPool,
    id: Uuid,
    current: &Deployment,
    new_status: DeploymentStatus,
) -> CoreResult<Deployment> {
    state_machine::validate_transition(current.status, new_status)
        .map_err(|e| CoreError::state_conflict(e.to_string()))?;

    let completed_at = if state_machine::is_terminal(new_status) {
        Some(Utc::now())
    } else {
        None
    };

    let deployment = sqlx::query_as::<_, Deployment>(
        r#"
        UPDATE deployments
        SET status = $2, completed_at = COALESCE($3, completed_at), updated_at = now()
        WHERE id = $1
        RETURNING id, tenant_id, owner_id, project_id, version, strategy, status, progress,
                  message, rollback_target_version, started_at, completed_at, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(new_status)
    .bind(completed_at)
    .fetch_one(pool)
    .await?;

    Ok(deployment)
}

pub async fn mark_in_progress(pool: &PgPool, current: &Deployment) -> CoreResult<Deployment> {
    let deployment = transition(pool, current.id, current, DeploymentStatus::InProgress).await?;
    sqlx::query("UPDATE deployments SET started_at = COALESCE(started_at, now()) WHERE id = $1")
        .bind(current.id)
        .execute(pool)
        .await
        .map_err(CoreError::from)?;
    Ok(deployment)
}

pub async fn update_progress(
    pool: &PgPool,
    id: Uuid,
    progress: i32,
    message: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE deployments SET progress = $2, message = COALESCE($3, message), updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(progress.clamp(0, 100))
    .bind(message)
    .execute(pool)
    .await
    .context("failed to update deployment progress")?;

    Ok(())
}

pub async fn mark_completed(pool: &PgPool, current: &Deployment) -> CoreResult<Deployment> {
    let deployment = transition(pool, current.id, current, DeploymentStatus::Completed).await?;
    sqlx::query("UPDATE deployments SET progress = 100 WHERE id = $1")
        .bind(current.id)
        .execute(pool)
        .await
        .map_err(CoreError::from)?;
    Ok(deployment)
}

pub async fn mark_failed(
    pool: &PgPool,
    current: &Deployment,
    message: &str,
) -> CoreResult<Deployment> {
    let deployment = transition(pool, current.id, current, DeploymentStatus::Failed).await?;
    sqlx::query("UPDATE deployments SET message = $2 WHERE id = $1")
        .bind(current.id)
        .bind(message)
        .execute(pool)
        .await
        .map_err(CoreError::from)?;
    Ok(deployment)
}

pub async fn mark_rolling_back(
    pool: &PgPool,
    current: &Deployment,
    rollback_target_version: &str,
) -> CoreResult<Deployment> {
    let deployment = transition(pool, current.id, current, DeploymentStatus::RollingBack).await?;
    sqlx::query("UPDATE deployments SET rollback_target_version = $2 WHERE id = $1")
        .bind(current.id)
        .bind(rollback_target_version)
        .execute(pool)
        .await
        .map_err(CoreError::from)?;
    Ok(deployment)
}

pub async fn mark_rolled_back(pool: &PgPool, current: &Deployment) -> CoreResult<Deployment> {
    transition(pool, current.id, current, DeploymentStatus::RolledBack).await
}
