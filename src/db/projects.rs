use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::Project;
use crate::error::{CoreError, CoreResult};
use crate::tenant::TenantContext;

/// Create a project. Enforces the `(tenant_id, name)` uniqueness invariant
/// (spec.md §3) through the backing unique index; a violation surfaces as
/// `CoreError::AlreadyExists`.
pub async fn create(
    pool: &PgPool,
    ctx: &TenantContext,
    name: &str,
    topology: serde_json::Value,
) -> CoreResult<Project> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO compose_projects (id, tenant_id, owner_id, name, topology, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, now(), now())
        RETURNING id, tenant_id, owner_id, name, topology, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(ctx.owner_id)
    .bind(name)
    .bind(topology)
    .fetch_one(pool)
    .await?;

    Ok(project)
}

/// Update a project's topology (content revision; identity is immutable).
pub async fn update_topology(
    pool: &PgPool,
    ctx: &TenantContext,
    id: Uuid,
    topology: serde_json::Value,
) -> CoreResult<Project> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        UPDATE compose_projects
        SET topology = $3, updated_at = now()
        WHERE id = $1 AND tenant_id = $2
        RETURNING id, tenant_id, owner_id, name, topology, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(ctx.tenant_id)
    .bind(topology)
    .fetch_one(pool)
    .await?;

    Ok(project)
}

pub async fn find_by_id(pool: &PgPool, ctx: &TenantContext, id: Uuid) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, tenant_id, owner_id, name, topology, created_at, updated_at
        FROM compose_projects
        WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(id)
    .bind(ctx.tenant_id)
    .fetch_optional(pool)
    .await
    .context("failed to find project by id")?;

    Ok(project)
}

pub async fn find_by_name(
    pool: &PgPool,
    ctx: &TenantContext,
    name: &str,
) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, tenant_id, owner_id, name, topology, created_at, updated_at
        FROM compose_projects
        WHERE tenant_id = $1 AND name = $2
        "#,
    )
    .bind(ctx.tenant_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("failed to find project by name")?;

    Ok(project)
}

pub async fn list(pool: &PgPool, ctx: &TenantContext) -> Result<Vec<Project>> {
    let projects = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, tenant_id, owner_id, name, topology, created_at, updated_at
        FROM compose_projects
        WHERE tenant_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(ctx.tenant_id)
    .fetch_all(pool)
    .await
    .context("failed to list projects")?;

    Ok(projects)
}

/// Delete a project. Cascades to its deployments and descendants (spec.md §3
/// ownership rules); the cascade itself is expressed as `ON DELETE CASCADE`
/// foreign keys in the migration, mirrored here only by the single DELETE.
pub async fn delete(pool: &PgPool, ctx: &TenantContext, id: Uuid) -> CoreResult<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM compose_projects
        WHERE id = $1 AND tenant_id = $2
        "#,
    )
    .bind(id)
    .bind(ctx.tenant_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::not_found(format!("project {id} not found")));
    }

    Ok(())
}
