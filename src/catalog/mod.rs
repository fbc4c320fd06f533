use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{BackupPolicy, Project};
use crate::db::{backup_policies, projects};
use crate::error::CoreResult;
use crate::tenant::TenantContext;

/// Resource Catalog (spec.md §2): an in-memory read cache in front of the
/// Projects and Backup Policies tables, scoped per tenant. Certificates
/// aren't cached here — the renewal scanner reads them straight off the
/// store on its own schedule, so a stale cache would buy nothing.
///
/// Follows the supervisor's registration-set locking shape
/// ([[supervisor::registration::RegistrationSet]]): reads take a shared
/// lock to clone out of the cache; writes go through the store first and
/// then update the cache, so a failed write never leaves a stale hit
/// behind.
pub struct ResourceCatalog {
    pool: PgPool,
    projects: RwLock<HashMap<Uuid, Project>>,
    policies: RwLock<HashMap<Uuid, BackupPolicy>>,
}

impl ResourceCatalog {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self {
            pool,
            projects: RwLock::new(HashMap::new()),
            policies: RwLock::new(HashMap::new()),
        })
    }

    pub async fn project(&self, ctx: &TenantContext, id: Uuid) -> CoreResult<Option<Project>> {
        if let Some(hit) = self.projects.read().await.get(&id) {
            if hit.tenant_id == ctx.tenant_id {
                return Ok(Some(hit.clone()));
            }
        }

        let found = projects::find_by_id(&self.pool, ctx, id).await?;
        if let Some(project) = &found {
            self.projects.write().await.insert(id, project.clone());
        }
        Ok(found)
    }

    pub async fn list_projects(&self, ctx: &TenantContext) -> CoreResult<Vec<Project>> {
        let list = projects::list(&self.pool, ctx).await?;
        let mut cache = self.projects.write().await;
        for project in &list {
            cache.insert(project.id, project.clone());
        }
        Ok(list)
    }

    pub async fn create_project(&self, ctx: &TenantContext, name: &str, topology: serde_json::Value) -> CoreResult<Project> {
        let project = projects::create(&self.pool, ctx, name, topology).await?;
        self.projects.write().await.insert(project.id, project.clone());
        Ok(project)
    }

    pub async fn update_project_topology(&self, ctx: &TenantContext, id: Uuid, topology: serde_json::Value) -> CoreResult<Project> {
        let project = projects::update_topology(&self.pool, ctx, id, topology).await?;
        self.projects.write().await.insert(project.id, project.clone());
        Ok(project)
    }

    pub async fn delete_project(&self, ctx: &TenantContext, id: Uuid) -> CoreResult<()> {
        projects::delete(&self.pool, ctx, id).await?;
        self.projects.write().await.remove(&id);
        Ok(())
    }

    pub async fn policy(&self, ctx: &TenantContext, id: Uuid) -> CoreResult<Option<BackupPolicy>> {
        if let Some(hit) = self.policies.read().await.get(&id) {
            if hit.tenant_id == ctx.tenant_id {
                return Ok(Some(hit.clone()));
            }
        }

        let found = backup_policies::find_by_id(&self.pool, ctx, id).await?;
        if let Some(policy) = &found {
            self.policies.write().await.insert(id, policy.clone());
        }
        Ok(found)
    }

    pub async fn list_policies(&self, ctx: &TenantContext) -> CoreResult<Vec<BackupPolicy>> {
        let list = backup_policies::list(&self.pool, ctx).await?;
        let mut cache = self.policies.write().await;
        for policy in &list {
            cache.insert(policy.id, policy.clone());
        }
        Ok(list)
    }

    /// Drops a cached policy so the next read goes to the store. Used after
    /// an out-of-band update this catalog wasn't the writer for (e.g. a
    /// direct `db::backup_policies` call elsewhere).
    pub async fn invalidate_policy(&self, id: Uuid) {
        self.policies.write().await.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> PgPool {
        PgPool::connect_lazy("postgres://localhost/unused").unwrap()
    }

    #[tokio::test]
    async fn project_cache_is_empty_before_any_read() {
        let catalog = ResourceCatalog::new(pool());
        assert!(catalog.projects.read().await.is_empty());
    }

    #[tokio::test]
    async fn cache_hit_is_rejected_across_tenants() {
        let catalog = ResourceCatalog::new(pool());
        let foreign_tenant = Uuid::new_v4();
        let project_id = Uuid::new_v4();
        catalog.projects.write().await.insert(
            project_id,
            Project {
                id: project_id,
                tenant_id: foreign_tenant,
                owner_id: foreign_tenant,
                name: "other-tenant-project".to_string(),
                topology: serde_json::json!({}),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
        );

        let caller_ctx = TenantContext::system(Uuid::new_v4());
        let cached = catalog.projects.read().await.get(&project_id).cloned();
        assert!(cached.is_some());
        assert_ne!(cached.unwrap().tenant_id, caller_ctx.tenant_id);
    }
}
