use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::models::{Deployment, DeploymentStatus, DeploymentStrategy};
use crate::db::{deployment_events, deployments as db_deployments, projects, service_instances};
use crate::deployment::bookkeeping::derive_healing_config;
use crate::deployment::progress::DbProgressSink;
use crate::deployment::strategies::{self, StrategyContext};
use crate::deployment::topology::Topology;
use crate::error::{CoreError, CoreResult};
use crate::state::CoreState;
use crate::supervisor::Supervisor;
use crate::tenant::TenantContext;

/// Deployment Engine orchestrator (spec.md §4.1). `Deploy` persists an
/// intent row and spawns a detached worker bound to a fresh cancellation
/// context; the originating request's cancellation must never propagate
/// into the worker (spec.md §5 "Scheduling model").
pub struct DeploymentController {
    state: Arc<CoreState>,
    supervisor: Arc<Supervisor>,
    cancellations: AsyncMutex<HashMap<Uuid, CancellationToken>>,
}

impl DeploymentController {
    pub fn new(state: Arc<CoreState>, supervisor: Arc<Supervisor>) -> Self {
        Self {
            state,
            supervisor,
            cancellations: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Spawn the reconcile loop: a safety net that picks up `pending`
    /// deployments with no in-process worker (e.g. after a restart).
    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            info!("deployment reconcile loop started");
            let interval = Duration::from_secs(self.state.settings.controller.reconcile_interval_secs);
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.reconcile().await {
                    error!(error = %err, "deployment reconcile pass failed");
                }
            }
        });
    }

    async fn reconcile(self: &Arc<Self>) -> anyhow::Result<()> {
        let candidates = db_deployments::find_non_terminal(&self.state.db_pool, 25).await?;
        let claimed = self.cancellations.lock().await;
        for deployment in candidates {
            if deployment.status == DeploymentStatus::Pending && !claimed.contains_key(&deployment.id) {
                drop(claimed);
                self.spawn_deploy_worker(deployment);
                return Ok(());
            }
        }
        Ok(())
    }

    /// `Deploy(project_id, config) → (deployment_id, accepted)`.
    pub async fn deploy(
        self: &Arc<Self>,
        ctx: TenantContext,
        project_id: Uuid,
        strategy: DeploymentStrategy,
    ) -> CoreResult<(Uuid, bool)> {
        let project = projects::find_by_id(&self.state.db_pool, &ctx, project_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("project {project_id} not found")))?;

        let version = db_deployments::next_version(&self.state.db_pool, &ctx, project.id).await?;
        let deployment = db_deployments::create(&self.state.db_pool, &ctx, project.id, &version, strategy).await?;

        deployment_events::append(
            &self.state.db_pool,
            deployment.id,
            "deployment_started",
            None,
            &format!("deployment {version} accepted"),
            serde_json::json!({ "strategy": strategy.to_string() }),
        )
        .await?;

        self.spawn_deploy_worker(deployment.clone());
        Ok((deployment.id, true))
    }

    /// `Rollback(deployment_id)` — valid from `completed` or `failed`.
    pub async fn rollback(self: &Arc<Self>, ctx: TenantContext, deployment_id: Uuid) -> CoreResult<Uuid> {
        let deployment = db_deployments::find_by_id(&self.state.db_pool, &ctx, deployment_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("deployment {deployment_id} not found")))?;

        if !matches!(deployment.status, DeploymentStatus::Completed | DeploymentStatus::Failed) {
            return Err(CoreError::state_conflict(format!(
                "deployment {deployment_id} cannot be rolled back from status {}",
                deployment.status
            )));
        }

        let target = db_deployments::find_rollback_target(&self.state.db_pool, &ctx, deployment.project_id, deployment.id)
            .await?
            .ok_or_else(|| CoreError::invalid_input("no prior completed deployment to roll back to"))?;

        let deployment = db_deployments::mark_rolling_back(&self.state.db_pool, &deployment, &target.version).await?;
        self.spawn_rollback_worker(ctx, deployment, target);
        Ok(deployment_id)
    }

    /// `Cancel(deployment_id)` — valid only in `pending`/`in_progress`.
    pub async fn cancel(&self, ctx: TenantContext, deployment_id: Uuid) -> CoreResult<()> {
        let deployment = db_deployments::find_by_id(&self.state.db_pool, &ctx, deployment_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("deployment {deployment_id} not found")))?;

        if !crate::deployment::state_machine::is_cancellable(deployment.status) {
            return Err(CoreError::state_conflict(format!(
                "deployment {deployment_id} is not cancellable from status {}",
                deployment.status
            )));
        }

        db_deployments::mark_failed(&self.state.db_pool, &deployment, "cancelled").await?;

        if let Some(token) = self.cancellations.lock().await.get(&deployment_id) {
            token.cancel();
        }

        Ok(())
    }

    fn spawn_deploy_worker(self: &Arc<Self>, deployment: Deployment) {
        let controller = self.clone();
        let token = CancellationToken::new();
        let deployment_id = deployment.id;
        let token_for_map = token.clone();
        tokio::spawn(async move {
            controller.cancellations.lock().await.insert(deployment_id, token_for_map);
            let ctx = TenantContext::new(deployment.tenant_id, deployment.owner_id);
            if let Err(err) = controller.run_deploy_worker(ctx, deployment, token).await {
                error!(deployment_id = %deployment_id, error = %err, "deploy worker failed");
            }
            controller.cancellations.lock().await.remove(&deployment_id);
        });
    }

    fn spawn_rollback_worker(self: &Arc<Self>, ctx: TenantContext, deployment: Deployment, target: Deployment) {
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(err) = controller.run_rollback_worker(ctx, deployment, target).await {
                error!(error = %err, "rollback worker failed");
            }
        });
    }

    async fn run_deploy_worker(
        self: &Arc<Self>,
        ctx: TenantContext,
        deployment: Deployment,
        token: CancellationToken,
    ) -> anyhow::Result<()> {
        if token.is_cancelled() {
            return Ok(());
        }

        let project = projects::find_by_id(&self.state.db_pool, &ctx, deployment.project_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("project {} vanished mid-deploy", deployment.project_id))?;

        let deployment = db_deployments::mark_in_progress(&self.state.db_pool, &deployment).await?;

        if token.is_cancelled() {
            return Ok(());
        }

        let topology = Topology::from_value(&project.topology)?;
        let settings = &self.state.settings.controller;
        let strategy_ctx = StrategyContext {
            runtime: self.state.container_runtime.as_ref(),
            router: self.state.traffic_router.as_deref(),
            project_name: &project.name,
            topology: &topology,
            health_check_delay: Duration::from_secs(settings.health_check_delay_secs),
            health_check_retries: settings.health_check_retries,
        };
        let sink = DbProgressSink::new(self.state.db_pool.clone(), deployment.id, self.state.event_bus.clone());

        let outcome = match deployment.strategy {
            DeploymentStrategy::Recreate => strategies::run_recreate(&strategy_ctx, &sink).await,
            DeploymentStrategy::Rolling => strategies::run_rolling(&strategy_ctx, &sink).await,
            DeploymentStrategy::BlueGreen => strategies::run_blue_green(&strategy_ctx, &sink).await,
        };

        match outcome {
            Ok(outcome) => {
                for container in &outcome.containers {
                    let info = self.state.container_runtime.get_container_info(&container.container_id).await?;
                    service_instances::create(
                        &self.state.db_pool,
                        &ctx,
                        deployment.id,
                        &container.service_name,
                        &container.container_id,
                        &info.image,
                        &format!("{:?}", info.status).to_lowercase(),
                        info.health.as_deref().unwrap_or("unknown"),
                    )
                    .await?;

                    if let Some(spec) = topology.services.get(&container.service_name) {
                        let healing_config = derive_healing_config(spec);
                        self.supervisor.register(ctx.tenant_id, &container.container_id, healing_config).await;
                    }
                }

                db_deployments::mark_completed(&self.state.db_pool, &deployment).await?;
                deployment_events::append(
                    &self.state.db_pool,
                    deployment.id,
                    "deployment_completed",
                    None,
                    "deployment completed successfully",
                    serde_json::json!({}),
                )
                .await?;
            }
            Err(err) => {
                self.handle_deploy_failure(ctx, deployment, &err.to_string()).await?;
            }
        }

        Ok(())
    }

    /// Failure handling (spec.md §4.1): optionally auto-rolls-back to the
    /// most recent completed deployment of the same project.
    async fn handle_deploy_failure(&self, ctx: TenantContext, deployment: Deployment, message: &str) -> anyhow::Result<()> {
        let deployment = db_deployments::mark_failed(&self.state.db_pool, &deployment, message).await?;
        deployment_events::append(
            &self.state.db_pool,
            deployment.id,
            "deployment_failed",
            None,
            message,
            serde_json::json!({}),
        )
        .await?;

        if !self.state.settings.controller.rollback_on_failure {
            return Ok(());
        }

        let Some(target) =
            db_deployments::find_rollback_target(&self.state.db_pool, &ctx, deployment.project_id, deployment.id).await?
        else {
            return Ok(());
        };

        let deployment = db_deployments::mark_rolling_back(&self.state.db_pool, &deployment, &target.version).await?;
        self.run_rollback_worker(ctx, deployment, target).await
    }

    /// Rollback always re-invokes the target's recorded topology via the
    /// `recreate` strategy, regardless of the original strategy used (spec.md
    /// §4.1 "Failure handling": "invoke its recorded topology (recreate)").
    async fn run_rollback_worker(&self, ctx: TenantContext, deployment: Deployment, target: Deployment) -> anyhow::Result<()> {
        let project = projects::find_by_id(&self.state.db_pool, &ctx, deployment.project_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("project {} vanished mid-rollback", deployment.project_id))?;

        let topology = Topology::from_value(&project.topology)?;
        let settings = &self.state.settings.controller;
        let strategy_ctx = StrategyContext {
            runtime: self.state.container_runtime.as_ref(),
            router: self.state.traffic_router.as_deref(),
            project_name: &project.name,
            topology: &topology,
            health_check_delay: Duration::from_secs(settings.health_check_delay_secs),
            health_check_retries: settings.health_check_retries,
        };
        let sink = DbProgressSink::new(self.state.db_pool.clone(), deployment.id, self.state.event_bus.clone());

        match strategies::run_recreate(&strategy_ctx, &sink).await {
            Ok(outcome) => {
                for container in &outcome.containers {
                    let info = self.state.container_runtime.get_container_info(&container.container_id).await?;
                    service_instances::create(
                        &self.state.db_pool,
                        &ctx,
                        deployment.id,
                        &container.service_name,
                        &container.container_id,
                        &info.image,
                        &format!("{:?}", info.status).to_lowercase(),
                        info.health.as_deref().unwrap_or("unknown"),
                    )
                    .await?;
                }
                db_deployments::mark_rolled_back(&self.state.db_pool, &deployment).await?;
                deployment_events::append(
                    &self.state.db_pool,
                    deployment.id,
                    "rollback_completed",
                    None,
                    &format!("rolled back to {}", target.version),
                    serde_json::json!({}),
                )
                .await?;
            }
            Err(err) => {
                let message = format!("rollback to {} failed: {err}", target.version);
                db_deployments::mark_failed(&self.state.db_pool, &deployment, &message).await?;
                warn!(deployment_id = %deployment.id, error = %err, "rollback worker failed");
                deployment_events::append(&self.state.db_pool, deployment.id, "rollback_failed", None, &message, serde_json::json!({}))
                    .await?;
            }
        }

        Ok(())
    }
}
