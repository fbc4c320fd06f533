use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::failure_records;
use crate::db::models::{ActionResult, HealAction, HealingConfig, HealthSnapshot, HealthStatus};
use crate::drivers::{Alert, AlertLevel, ContainerStatus};
use crate::state::CoreState;
use crate::supervisor::registration::RegistrationSet;
use crate::tenant::TenantContext;

/// Self-Healing Supervisor (spec.md §4.2): one monitor loop that watches
/// every registered container, classifies failures, and applies a bounded
/// restart policy.
pub struct Supervisor {
    state: Arc<CoreState>,
    registrations: RegistrationSet,
    tick_interval: Duration,
}

impl Supervisor {
    pub fn new(state: Arc<CoreState>) -> Self {
        let tick_interval = Duration::from_secs(state.settings.supervisor.monitor_tick_secs);
        Self {
            state,
            registrations: RegistrationSet::new(),
            tick_interval,
        }
    }

    pub async fn register(&self, tenant_id: Uuid, container_id: &str, config: HealingConfig) {
        self.registrations.register(tenant_id, container_id, config).await;
    }

    pub async fn unregister(&self, container_id: &str) {
        self.registrations.unregister(container_id).await;
    }

    pub async fn get_health(&self, container_id: &str) -> Option<HealthSnapshot> {
        let registration = self.registrations.get(container_id).await?;
        let health = registration.lock().await.health.clone();
        Some(health)
    }

    pub async fn get_failures(&self, container_id: &str, limit: i64) -> anyhow::Result<Vec<crate::db::models::FailureRecord>> {
        failure_records::list_for_container(&self.state.db_pool, container_id, limit).await
    }

    /// Spawn the permanent monitor loop (spec.md §4.2 "Start(ctx)").
    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            info!("self-healing monitor loop started");
            let mut ticker = tokio::time::interval(self.tick_interval);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        });
    }

    async fn tick(&self) {
        let snapshot = self.registrations.snapshot().await;
        for (container_id, registration) in snapshot {
            let (check_interval, last_check) = {
                let guard = registration.lock().await;
                (guard.config.check_interval, guard.health.last_check_time)
            };

            if Utc::now() - last_check < chrono::Duration::from_std(check_interval).unwrap_or_default() {
                continue;
            }

            if let Err(err) = self.check_container(&container_id, &registration).await {
                error!(container_id = %container_id, error = %err, "supervisor check failed unexpectedly");
            }
        }
    }

    async fn check_container(
        &self,
        container_id: &str,
        registration: &Arc<tokio::sync::Mutex<crate::db::models::HealingRegistration>>,
    ) -> anyhow::Result<()> {
        let status = tokio::time::timeout(
            {
                let guard = registration.lock().await;
                guard.config.check_timeout
            },
            self.state.container_runtime.get_container_status(container_id),
        )
        .await;

        let mut guard = registration.lock().await;
        guard.health.last_check_time = Utc::now();
        let tenant_id = guard.tenant_id;

        match status {
            Err(_) | Ok(Err(_)) => {
                let message = match status {
                    Ok(Err(err)) => err.to_string(),
                    _ => "health check timed out".to_string(),
                };
                self.handle_unhealthy(&mut guard, tenant_id, container_id, "health_check_failed", &message)
                    .await?;
            }
            Ok(Ok(ContainerStatus::Running)) | Ok(Ok(ContainerStatus::Healthy)) => {
                self.handle_healthy(&mut guard, container_id).await?;
            }
            Ok(Ok(observed)) => {
                let message = format!("observed status {observed:?}");
                self.handle_unhealthy(&mut guard, tenant_id, container_id, "container_stopped", &message)
                    .await?;
            }
        }

        Ok(())
    }

    async fn handle_healthy(
        &self,
        guard: &mut crate::db::models::HealingRegistration,
        container_id: &str,
    ) -> anyhow::Result<()> {
        if guard.health.status != HealthStatus::Healthy {
            guard.health.status = HealthStatus::Healthy;
            failure_records::resolve_open(&self.state.db_pool, container_id).await?;
        }
        guard.health.consecutive_failures = 0;
        Ok(())
    }

    async fn handle_unhealthy(
        &self,
        guard: &mut crate::db::models::HealingRegistration,
        tenant_id: Uuid,
        container_id: &str,
        failure_type: &str,
        message: &str,
    ) -> anyhow::Result<()> {
        guard.health.status = HealthStatus::Unhealthy;
        guard.health.consecutive_failures += 1;
        guard.health.message = Some(message.to_string());

        let exhausted = guard.restart_timestamps.len() as u32 >= guard.config.max_restarts;
        let action = if guard.config.auto_restart && !exhausted {
            HealAction::Restart
        } else if guard.config.send_alert {
            HealAction::Alert
        } else {
            HealAction::None
        };

        let ctx = TenantContext::system(tenant_id);
        failure_records::create(
            &self.state.db_pool,
            &ctx,
            container_id,
            failure_type,
            message,
            serde_json::json!({}),
            action,
        )
        .await?;

        if guard.health.consecutive_failures >= guard.config.failure_threshold {
            self.heal(guard, tenant_id, container_id).await?;
        }

        Ok(())
    }

    /// Bounded restart policy (spec.md §4.2 "Heal").
    async fn heal(
        &self,
        guard: &mut crate::db::models::HealingRegistration,
        tenant_id: Uuid,
        container_id: &str,
    ) -> anyhow::Result<()> {
        if !guard.config.auto_restart {
            if guard.config.send_alert {
                self.alert(AlertLevel::Critical, "Container unhealthy", container_id, "container is unhealthy and auto_restart is disabled")
                    .await;
            }
            return Ok(());
        }

        let window = chrono::Duration::from_std(guard.config.restart_window).unwrap_or_default();
        prune_expired_restarts(&mut guard.restart_timestamps, window, Utc::now());

        if guard.restart_timestamps.len() as u32 >= guard.config.max_restarts {
            self.alert(AlertLevel::Critical, "restart limit exceeded", container_id, "restart limit exceeded within window")
                .await;
            let ctx = TenantContext::system(tenant_id);
            failure_records::create(
                &self.state.db_pool,
                &ctx,
                container_id,
                "restart_limit_exceeded",
                "restart limit exceeded within window",
                serde_json::json!({ "max_restarts": guard.config.max_restarts }),
                HealAction::None,
            )
            .await?;
            return Ok(());
        }

        match self.restart(container_id).await {
            Ok(()) => {
                guard.restart_timestamps.push_back(Utc::now());
                guard.health.total_restarts += 1;
                guard.health.last_restart_time = Some(Utc::now());
                guard.health.consecutive_failures = 0;

                self.alert(AlertLevel::Warning, "Container restarted", container_id, "container was automatically restarted")
                    .await;
                let ctx = TenantContext::system(tenant_id);
                failure_records::create(
                    &self.state.db_pool,
                    &ctx,
                    container_id,
                    "auto_restart",
                    "container automatically restarted",
                    serde_json::json!({}),
                    HealAction::Restart,
                )
                .await?;
                failure_records::patch_latest_pending(&self.state.db_pool, container_id, ActionResult::Success).await?;
            }
            Err(err) => {
                warn!(container_id, error = %err, "automatic restart failed");
                let ctx = TenantContext::system(tenant_id);
                failure_records::create(
                    &self.state.db_pool,
                    &ctx,
                    container_id,
                    "restart_failed",
                    &err.to_string(),
                    serde_json::json!({}),
                    HealAction::Restart,
                )
                .await?;
                failure_records::patch_latest_pending(&self.state.db_pool, container_id, ActionResult::Failed).await?;
                self.alert(AlertLevel::Error, "Container restart failed", container_id, &err.to_string())
                    .await;
            }
        }

        Ok(())
    }

    async fn restart(&self, container_id: &str) -> anyhow::Result<()> {
        self.state.container_runtime.restart_container(container_id).await
    }

    async fn alert(&self, level: AlertLevel, title: &str, container_id: &str, message: &str) {
        let alert = Alert {
            level,
            title: title.to_string(),
            message: message.to_string(),
            container_id: Some(container_id.to_string()),
            service_name: None,
            project_name: None,
            timestamp: Utc::now(),
            details: serde_json::json!({}),
        };
        if let Err(err) = self.state.notifier.send_alert(alert).await {
            warn!(error = %err, "failed to dispatch supervisor alert");
        }
    }
}

/// Drops restart timestamps older than `window` measured from `now`
/// (spec.md §8 sliding-window restart cap).
fn prune_expired_restarts(timestamps: &mut std::collections::VecDeque<DateTime<Utc>>, window: chrono::Duration, now: DateTime<Utc>) {
    let cutoff = now - window;
    while timestamps.front().is_some_and(|ts| *ts < cutoff) {
        timestamps.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::drivers::ContainerRuntime;
    use crate::db::models::HealingRegistration;
    use crate::drivers::fakes::{FakeContainerRuntime, FakeNotifier, FakeStorageBackend, FakeTrafficRouter};
    use crate::settings::Settings;
    use crate::state::{CoreState, SourceDriverRegistry};

    struct NullRegistry;
    impl SourceDriverRegistry for NullRegistry {
        fn resolve(&self, _source_type: crate::db::models::BackupSourceType) -> Option<Arc<dyn crate::drivers::SourceDriver>> {
            None
        }
    }

    fn supervisor_with_fakes(runtime: Arc<FakeContainerRuntime>, notifier: Arc<FakeNotifier>) -> Supervisor {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        let state = Arc::new(CoreState::new(
            pool,
            Settings::default(),
            runtime,
            Arc::new(FakeStorageBackend::new()),
            Arc::new(NullRegistry),
            notifier,
            Some(Arc::new(FakeTrafficRouter::new())),
            None,
            Arc::new(crate::events::InMemoryEventBus::default()),
        ));
        Supervisor::new(state)
    }

    #[test]
    fn prune_expired_restarts_evicts_entries_outside_window() {
        let now = Utc::now();
        let mut timestamps = VecDeque::new();
        timestamps.push_back(now - ChronoDuration::seconds(20));
        timestamps.push_back(now - ChronoDuration::seconds(1));

        prune_expired_restarts(&mut timestamps, ChronoDuration::seconds(10), now);

        assert_eq!(timestamps.len(), 1);
    }

    #[test]
    fn restart_limit_is_reached_after_max_restarts_within_window() {
        let now = Utc::now();
        let mut timestamps = VecDeque::new();
        timestamps.push_back(now - ChronoDuration::seconds(5));
        timestamps.push_back(now - ChronoDuration::seconds(2));

        prune_expired_restarts(&mut timestamps, ChronoDuration::seconds(10), now);

        let max_restarts = 2;
        assert!(timestamps.len() as u32 >= max_restarts, "third detection must be refused once max_restarts is reached");
    }

    #[tokio::test]
    async fn heal_restarts_via_driver_until_the_limit_then_stops_calling_it() {
        let runtime = Arc::new(FakeContainerRuntime::new());
        let notifier = Arc::new(FakeNotifier::new());
        let supervisor = supervisor_with_fakes(runtime.clone(), notifier.clone());

        let tenant_id = Uuid::new_v4();
        let mut config = HealingConfig::default();
        config.max_restarts = 2;
        config.restart_window = std::time::Duration::from_secs(10);
        let mut registration = HealingRegistration::new(tenant_id, "c1", config);

        // Two restarts within the window succeed against the fake driver;
        // persisting the resulting failure record fails against the unused
        // pool, which is expected here and doesn't affect the assertions
        // below since the driver call and in-memory bookkeeping both
        // complete first.
        let _ = supervisor.heal(&mut registration, tenant_id, "c1").await;
        let _ = supervisor.heal(&mut registration, tenant_id, "c1").await;
        assert_eq!(registration.restart_timestamps.len(), 2);

        let _ = supervisor.heal(&mut registration, tenant_id, "c1").await;
        assert_eq!(
            registration.restart_timestamps.len(),
            2,
            "a third heal within the window must not record another restart"
        );

        let alerts = notifier.sent.lock().unwrap();
        assert!(alerts.iter().any(|a| a.title == "restart limit exceeded"));
    }

    #[tokio::test]
    async fn healthy_container_is_never_restarted() {
        let runtime = Arc::new(FakeContainerRuntime::new());
        let notifier = Arc::new(FakeNotifier::new());
        let supervisor = supervisor_with_fakes(runtime.clone(), notifier.clone());

        let container_id = runtime.start_service("p1", "web", &serde_json::json!({})).await.unwrap();

        let tenant_id = Uuid::new_v4();
        let registration = Arc::new(tokio::sync::Mutex::new(HealingRegistration::new(tenant_id, container_id.clone(), HealingConfig::default())));
        {
            let mut guard = registration.lock().await;
            guard.health.status = HealthStatus::Healthy;
        }

        supervisor.check_container(&container_id, &registration).await.unwrap();

        let guard = registration.lock().await;
        assert_eq!(guard.health.status, HealthStatus::Healthy);
        assert_eq!(guard.health.consecutive_failures, 0);
        assert!(guard.restart_timestamps.is_empty());
    }
}
