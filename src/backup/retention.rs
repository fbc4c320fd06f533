use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::warn;

use crate::db::backup_jobs;
use crate::db::models::BackupPolicy;
use crate::state::CoreState;

/// Delete completed backup jobs older than `retention_days` (spec.md §4.3
/// "SweepRetention"). A no-op when `retention_days <= 0`. Remote-delete
/// failures are logged but never block the row delete — the documented
/// policy is to prefer losing the remote blob's reference over blocking on
/// a storage outage.
pub async fn sweep(state: &Arc<CoreState>, policy: &BackupPolicy) -> anyhow::Result<()> {
    if policy.retention_days <= 0 {
        return Ok(());
    }

    let cutoff = Utc::now() - Duration::days(policy.retention_days as i64);
    let expired = backup_jobs::find_expired_completed(&state.db_pool, policy.id, cutoff).await?;

    for job in expired {
        if let Some(remote_path) = &job.file_path {
            if let Err(err) = state.storage_backend.delete(remote_path, &policy.storage_config).await {
                warn!(job_id = %job.id, error = %err, "retention sweep: remote delete failed, dropping row anyway");
            }
        }
        backup_jobs::delete(&state.db_pool, job.id).await?;
    }

    Ok(())
}
