use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::VecDeque;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Project / topology
// ---------------------------------------------------------------------------

/// A declarative topology of services belonging to one tenant.
///
/// `topology` is the opaque, already-parsed output of the `ConfigParser`
/// collaborator (compose YAML parsing itself is out of scope for this crate).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub topology: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum DeploymentStrategy {
    Recreate,
    Rolling,
    BlueGreen,
}

impl std::fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentStrategy::Recreate => write!(f, "recreate"),
            DeploymentStrategy::Rolling => write!(f, "rolling"),
            DeploymentStrategy::BlueGreen => write!(f, "blue_green"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    RollingBack,
    RolledBack,
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentStatus::Pending => write!(f, "pending"),
            DeploymentStatus::InProgress => write!(f, "in_progress"),
            DeploymentStatus::Completed => write!(f, "completed"),
            DeploymentStatus::Failed => write!(f, "failed"),
            DeploymentStatus::RollingBack => write!(f, "rolling_back"),
            DeploymentStatus::RolledBack => write!(f, "rolled_back"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Deployment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub strategy: DeploymentStrategy,
    pub status: DeploymentStatus,
    pub progress: i32,
    pub message: Option<String>,
    pub rollback_target_version: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceInstance {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub deployment_id: Uuid,
    pub service_name: String,
    pub container_id: String,
    pub image: String,
    pub status: String,
    pub health: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeploymentEvent {
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub event_type: String,
    pub service_name: Option<String>,
    pub message: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Self-healing supervisor
// ---------------------------------------------------------------------------

/// Restart policy + thresholds derived for one registered container.
///
/// In-memory only (spec.md §3: "need not persist across restart").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingConfig {
    pub check_interval: std::time::Duration,
    pub check_timeout: std::time::Duration,
    pub failure_threshold: u32,
    pub max_restarts: u32,
    pub restart_window: std::time::Duration,
    pub auto_restart: bool,
    pub send_alert: bool,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            check_interval: std::time::Duration::from_secs(30),
            check_timeout: std::time::Duration::from_secs(10),
            failure_threshold: 3,
            max_restarts: 5,
            restart_window: std::time::Duration::from_secs(5 * 60),
            auto_restart: true,
            send_alert: true,
        }
    }
}

/// In-memory registration of a container under supervision.
#[derive(Debug, Clone)]
pub struct HealingRegistration {
    pub tenant_id: Uuid,
    pub container_id: String,
    pub config: HealingConfig,
    pub health: HealthSnapshot,
    /// Bounded ring buffer of restart timestamps used for the sliding-window cap.
    pub restart_timestamps: VecDeque<DateTime<Utc>>,
}

impl HealingRegistration {
    pub fn new(tenant_id: Uuid, container_id: impl Into<String>, config: HealingConfig) -> Self {
        let container_id = container_id.into();
        Self {
            tenant_id,
            health: HealthSnapshot::unknown(container_id.clone()),
            container_id,
            config,
            restart_timestamps: VecDeque::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub container_id: String,
    pub status: HealthStatus,
    pub last_check_time: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub total_restarts: u32,
    pub last_restart_time: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

impl HealthSnapshot {
    pub fn unknown(container_id: String) -> Self {
        Self {
            container_id,
            status: HealthStatus::Unknown,
            last_check_time: Utc::now(),
            consecutive_failures: 0,
            total_restarts: 0,
            last_restart_time: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum HealAction {
    Restart,
    Alert,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ActionResult {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FailureRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub container_id: String,
    pub failure_type: String,
    pub error_message: String,
    pub details: serde_json::Value,
    pub action: HealAction,
    pub action_result: ActionResult,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Backup / restore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BackupSourceType {
    Database,
    Files,
    Container,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BackupPolicy {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub source_type: BackupSourceType,
    pub source_config: serde_json::Value,
    pub storage_type: String,
    pub storage_config: serde_json::Value,
    pub schedule_cron: String,
    pub retention_days: i32,
    pub compression: bool,
    pub encryption: bool,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BackupJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub policy_id: Uuid,
    pub status: JobStatus,
    pub file_path: Option<String>,
    pub file_size: i64,
    pub checksum: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RestoreJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub backup_job_id: Uuid,
    pub target: serde_json::Value,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Result of a synchronous `Validate` call (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupValidation {
    pub valid: bool,
    pub checksum: Option<String>,
    pub file_size: i64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Aggregate health of a policy's backup history (spec.md §4.3 "Health").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupHealth {
    pub policy_id: Uuid,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub issues: Vec<String>,
}

// ---------------------------------------------------------------------------
// Certificates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum CertProvider {
    Acme,
    Manual,
    SelfSigned,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum CertStatus {
    Pending,
    Valid,
    Expired,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Certificate {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub domain: String,
    pub email: String,
    pub provider: CertProvider,
    pub status: CertStatus,
    pub cert_pem: Option<String>,
    pub key_pem: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub renew_days_before: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
