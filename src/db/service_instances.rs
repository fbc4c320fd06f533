use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::db::models::ServiceInstance;
use crate::tenant::TenantContext;

pub async fn create(
    pool: &sqlx::PgPool,
    ctx: &TenantContext,
    deployment_id: Uuid,
    service_name: &str,
    container_id: &str,
    image: &str,
    status: &str,
    health: &str,
) -> Result<ServiceInstance> {
    let instance = sqlx::query_as::<_, ServiceInstance>(
        r#"
        INSERT INTO service_instances
            (id, tenant_id, deployment_id, service_name, container_id, image, status, health, started_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, tenant_id, deployment_id, service_name, container_id, image, status, health, started_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(deployment_id)
    .bind(service_name)
    .bind(container_id)
    .bind(image)
    .bind(status)
    .bind(health)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .context("failed to create service instance")?;

    Ok(instance)
}

pub async fn list_for_deployment(
    pool: &sqlx::PgPool,
    deployment_id: Uuid,
) -> Result<Vec<ServiceInstance>> {
    let instances = sqlx::query_as::<_, ServiceInstance>(
        r#"
        SELECT id, tenant_id, deployment_id, service_name, container_id, image, status, health, started_at
        FROM service_instances
        WHERE deployment_id = $1
        ORDER BY started_at ASC
        "#,
    )
    .bind(deployment_id)
    .fetch_all(pool)
    .await
    .context("failed to list service instances for deployment")?;

    Ok(instances)
}
