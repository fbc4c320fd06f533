use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::error;
use uuid::Uuid;

use crate::backup::retention;
use crate::db::models::{BackupHealth, BackupJob, BackupPolicy, BackupValidation, JobStatus};
use crate::db::{backup_jobs, backup_policies, restore_jobs};
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, JobKind};
use crate::state::CoreState;
use crate::tenant::TenantContext;

/// Backup Controller (spec.md §4.3): asynchronous backup/restore jobs,
/// retention sweep, and synchronous validation/health queries.
pub struct BackupController {
    state: Arc<CoreState>,
}

impl BackupController {
    pub fn new(state: Arc<CoreState>) -> Self {
        Self { state }
    }

    fn publish(&self, job_kind: JobKind, job_id: Uuid, event_type: &str, message: &str) {
        self.state.event_bus.publish(Event {
            job_kind,
            job_id,
            event_type: event_type.to_string(),
            message: message.to_string(),
            details: serde_json::json!({}),
            occurred_at: chrono::Utc::now(),
        });
    }

    /// Spawns the periodic retention sweep (spec.md §4.3 "SweepRetention"),
    /// run here again across every enabled policy regardless of tenant so a
    /// policy whose last backup predates a retention_days change still gets
    /// swept on schedule rather than only on its next `ExecuteBackup`.
    pub fn start(self: Arc<Self>) {
        let interval = Duration::from_secs(self.state.settings.controller.retention_sweep_interval_secs);
        let controller = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match backup_policies::list_all_enabled(&controller.state.db_pool).await {
                    Ok(policies) => {
                        for policy in &policies {
                            if let Err(err) = retention::sweep(&controller.state, policy).await {
                                error!(policy_id = %policy.id, error = %err, "scheduled retention sweep failed");
                            }
                        }
                    }
                    Err(err) => error!(error = %err, "failed to list enabled backup policies for retention sweep"),
                }
            }
        });
    }

    /// `ExecuteBackup(policy_id) → job_id`.
    pub async fn execute_backup(self: &Arc<Self>, ctx: TenantContext, policy_id: Uuid) -> CoreResult<Uuid> {
        let policy = backup_policies::find_by_id(&self.state.db_pool, &ctx, policy_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("backup policy {policy_id} not found")))?;

        let job = backup_jobs::create(&self.state.db_pool, &ctx, policy.id).await?;
        let job_id = job.id;

        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(err) = controller.run_backup_worker(job_id, policy).await {
                error!(job_id = %job_id, error = %err, "backup worker failed");
            }
        });

        Ok(job_id)
    }

    async fn run_backup_worker(&self, job_id: Uuid, policy: BackupPolicy) -> anyhow::Result<()> {
        let source = self
            .state
            .source_drivers
            .resolve(policy.source_type)
            .ok_or_else(|| anyhow::anyhow!("no source driver registered for {:?}", policy.source_type))?;

        let result: anyhow::Result<()> = async {
            let local_path = source.snapshot(&policy).await?;
            let (checksum, size) = checksum_and_size(&local_path).await?;
            let remote_path = self.state.storage_backend.upload(&local_path, &policy.storage_config).await?;

            backup_jobs::mark_completed(&self.state.db_pool, job_id, &remote_path, size, &checksum).await?;
            tokio::fs::remove_file(&local_path).await.ok();

            retention::sweep(&self.state, &policy).await?;
            Ok(())
        }
        .await;

        match &result {
            Ok(()) => self.publish(JobKind::Backup, job_id, "backup_completed", "backup completed"),
            Err(err) => {
                backup_jobs::mark_failed(&self.state.db_pool, job_id, &err.to_string()).await?;
                self.publish(JobKind::Backup, job_id, "backup_failed", &err.to_string());
            }
        }

        Ok(())
    }

    /// `Restore(backup_job_id, target) → restore_job_id`.
    pub async fn restore(self: &Arc<Self>, ctx: TenantContext, backup_job_id: Uuid, target: serde_json::Value) -> CoreResult<Uuid> {
        let job = backup_jobs::find_by_id(&self.state.db_pool, backup_job_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("backup job {backup_job_id} not found")))?;

        let policy = backup_policies::find_by_id(&self.state.db_pool, &ctx, job.policy_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("backup policy {} not found", job.policy_id)))?;

        let restore_job = restore_jobs::create(&self.state.db_pool, &ctx, backup_job_id, target.clone()).await?;
        let restore_job_id = restore_job.id;

        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(err) = controller.run_restore_worker(restore_job_id, job, policy, target).await {
                error!(restore_job_id = %restore_job_id, error = %err, "restore worker failed");
            }
        });

        Ok(restore_job_id)
    }

    async fn run_restore_worker(
        &self,
        restore_job_id: Uuid,
        job: BackupJob,
        policy: BackupPolicy,
        target: serde_json::Value,
    ) -> anyhow::Result<()> {
        let source = self
            .state
            .source_drivers
            .resolve(policy.source_type)
            .ok_or_else(|| anyhow::anyhow!("no source driver registered for {:?}", policy.source_type))?;

        let remote_path = job
            .file_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("backup job {} has no stored artifact", job.id))?;

        let local_path = std::env::temp_dir().join(format!("restore_{}_{}", restore_job_id, chrono_timestamp()));
        let local_path = local_path.to_string_lossy().into_owned();

        let result: anyhow::Result<()> = async {
            self.state.storage_backend.download(remote_path, &local_path, &policy.storage_config).await?;

            let (checksum, _size) = checksum_and_size(&local_path).await?;
            if let Some(expected) = &job.checksum {
                if &checksum != expected {
                    anyhow::bail!("checksum mismatch");
                }
            }

            source.restore(&local_path, &target).await?;
            Ok(())
        }
        .await;

        tokio::fs::remove_file(&local_path).await.ok();

        match result {
            Ok(()) => {
                restore_jobs::mark_completed(&self.state.db_pool, restore_job_id).await?;
                self.publish(JobKind::Restore, restore_job_id, "restore_completed", "restore completed");
            }
            Err(err) => {
                restore_jobs::mark_failed(&self.state.db_pool, restore_job_id, &err.to_string()).await?;
                self.publish(JobKind::Restore, restore_job_id, "restore_failed", &err.to_string());
            }
        }

        Ok(())
    }

    /// `Validate(backup_job_id) → {valid, checksum, file_size, errors, warnings}`.
    pub async fn validate(&self, job: &BackupJob, policy: &BackupPolicy) -> anyhow::Result<BackupValidation> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let exists = match &job.file_path {
            Some(remote_path) => self.state.storage_backend.exists(remote_path, &policy.storage_config).await?,
            None => {
                errors.push("job has no remote artifact recorded".to_string());
                false
            }
        };

        if !exists && job.file_path.is_some() {
            errors.push("remote artifact not found".to_string());
        }
        if job.status != JobStatus::Completed {
            warnings.push(format!("job status is {:?}, not completed", job.status));
        }

        Ok(BackupValidation {
            valid: errors.is_empty() && exists,
            checksum: job.checksum.clone(),
            file_size: job.file_size,
            errors,
            warnings,
        })
    }

    /// `Health(policy_id)` — aggregate counts plus advisory issues.
    pub async fn health(&self, policy: &BackupPolicy) -> anyhow::Result<BackupHealth> {
        let jobs = backup_jobs::list_for_policy(&self.state.db_pool, policy.id).await?;

        let total = jobs.len() as u64;
        let successful = jobs.iter().filter(|j| j.status == JobStatus::Completed).count() as u64;
        let failed = jobs.iter().filter(|j| j.status == JobStatus::Failed).count() as u64;

        let mut issues = Vec::new();
        if !policy.enabled {
            issues.push("policy is disabled".to_string());
        }
        if policy.retention_days < 7 {
            issues.push("retention_days is below the 7-day advisory minimum".to_string());
        }
        if !policy.encryption {
            issues.push("encryption is disabled".to_string());
        }

        Ok(BackupHealth {
            policy_id: policy.id,
            total,
            successful,
            failed,
            issues,
        })
    }
}

async fn checksum_and_size(path: &str) -> anyhow::Result<(String, i64)> {
    let data = tokio::fs::read(path).await?;
    let size = data.len() as i64;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    let checksum = format!("{:x}", hasher.finalize());
    Ok((checksum, size))
}

fn chrono_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::BackupSourceType;
    use crate::drivers::fakes::{FakeContainerRuntime, FakeNotifier, FakeStorageBackend, FakeTrafficRouter};
    use crate::state::{CoreState, SourceDriverRegistry};
    use crate::settings::Settings;
    use chrono::Utc;

    struct NullRegistry;
    impl SourceDriverRegistry for NullRegistry {
        fn resolve(&self, _source_type: BackupSourceType) -> Option<Arc<dyn crate::drivers::SourceDriver>> {
            None
        }
    }

    fn policy(tenant_id: Uuid, retention_days: i32, enabled: bool, encryption: bool) -> BackupPolicy {
        let now = Utc::now();
        BackupPolicy {
            id: Uuid::new_v4(),
            tenant_id,
            owner_id: tenant_id,
            source_type: BackupSourceType::Database,
            source_config: serde_json::json!({}),
            storage_type: "fake".to_string(),
            storage_config: serde_json::json!({}),
            schedule_cron: "0 0 * * *".to_string(),
            retention_days,
            compression: false,
            encryption,
            enabled,
            created_at: now,
            updated_at: now,
        }
    }

    fn job(tenant_id: Uuid, policy_id: Uuid, status: JobStatus, file_path: Option<String>) -> BackupJob {
        let now = Utc::now();
        BackupJob {
            id: Uuid::new_v4(),
            tenant_id,
            policy_id,
            status,
            file_path,
            file_size: 0,
            checksum: None,
            start_time: now,
            end_time: None,
            duration_seconds: None,
            error_message: None,
            created_at: now,
        }
    }

    fn controller_with_storage(storage: Arc<FakeStorageBackend>) -> Arc<BackupController> {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        let state = Arc::new(CoreState::new(
            pool,
            Settings::default(),
            Arc::new(FakeContainerRuntime::new()),
            storage,
            Arc::new(NullRegistry),
            Arc::new(FakeNotifier::new()),
            Some(Arc::new(FakeTrafficRouter::new())),
            None,
            Arc::new(crate::events::InMemoryEventBus::default()),
        ));
        Arc::new(BackupController::new(state))
    }

    #[tokio::test]
    async fn validate_fails_when_remote_artifact_missing() {
        let storage = Arc::new(FakeStorageBackend::new());
        let controller = controller_with_storage(storage);
        let pol = policy(Uuid::new_v4(), 30, true, true);
        let j = job(pol.tenant_id, pol.id, JobStatus::Completed, Some("missing.tar".to_string()));

        let result = controller.validate(&j, &pol).await.unwrap();
        assert!(!result.valid);
        assert!(!result.errors.is_empty());
    }

    #[tokio::test]
    async fn validate_succeeds_when_artifact_present() {
        let storage = Arc::new(FakeStorageBackend::new());
        storage.seed("backups/present.tar");
        let controller = controller_with_storage(storage);
        let pol = policy(Uuid::new_v4(), 30, true, true);
        let j = job(pol.tenant_id, pol.id, JobStatus::Completed, Some("backups/present.tar".to_string()));

        let result = controller.validate(&j, &pol).await.unwrap();
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn health_flags_disabled_short_retention_and_plaintext_policy() {
        let storage = Arc::new(FakeStorageBackend::new());
        let controller = controller_with_storage(storage);
        let pol = policy(Uuid::new_v4(), 1, false, false);

        let health = controller.health(&pol).await.unwrap();
        assert_eq!(health.total, 0);
        assert_eq!(health.issues.len(), 3);
    }
}
