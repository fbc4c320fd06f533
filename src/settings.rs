use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub database: DatabaseSettings,
    #[serde(default)]
    pub controller: ControllerSettings,
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    #[serde(default)]
    pub certificate: CertificateSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_reconcile_interval() -> u64 {
    15
}

fn default_health_check_interval() -> u64 {
    5
}

fn default_retention_sweep_interval() -> u64 {
    3600
}

/// Intervals for the Deployment Engine and Backup Controller loops (spec.md
/// §4.1, §4.3).
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerSettings {
    /// How often the deployment reconcile loop polls for pending/in-progress
    /// deployments (default: 15s).
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// How often health is re-checked for active deployments (default: 5s).
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// `health_check_delay` used by strategies before the first poll
    /// (default: 5s).
    #[serde(default = "default_health_check_interval")]
    pub health_check_delay_secs: u64,

    /// Retries per container health poll (default: 3, per spec.md §4.2
    /// `failure_threshold` default shared with the supervisor).
    #[serde(default = "default_health_check_retries")]
    pub health_check_retries: u32,

    /// Backup retention sweep cadence (default: 1h).
    #[serde(default = "default_retention_sweep_interval")]
    pub retention_sweep_interval_secs: u64,

    /// Whether a failed deployment automatically rolls back to the last
    /// completed deployment of the same project (spec.md §4.1 "Failure
    /// handling").
    #[serde(default = "default_true")]
    pub rollback_on_failure: bool,
}

fn default_health_check_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval(),
            health_check_interval_secs: default_health_check_interval(),
            health_check_delay_secs: default_health_check_interval(),
            health_check_retries: default_health_check_retries(),
            retention_sweep_interval_secs: default_retention_sweep_interval(),
            rollback_on_failure: default_true(),
        }
    }
}

fn default_monitor_interval() -> u64 {
    10
}

/// Supervisor defaults (spec.md §4.2 "Config"); per-registration values may
/// override these at `Register` time.
#[derive(Debug, Deserialize, Clone)]
pub struct SupervisorSettings {
    #[serde(default = "default_monitor_interval")]
    pub monitor_tick_secs: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            monitor_tick_secs: default_monitor_interval(),
        }
    }
}

fn default_renewal_scan_interval() -> u64 {
    3600
}

fn default_cert_store() -> String {
    "/var/lib/opslane/certs".to_string()
}

fn default_webroot() -> String {
    "/var/lib/opslane/acme-webroot".to_string()
}

fn default_acme_directory_url() -> String {
    "https://acme-v02.api.letsencrypt.org/directory".to_string()
}

/// Certificate controller configuration (spec.md §4.4).
#[derive(Debug, Deserialize, Clone)]
pub struct CertificateSettings {
    #[serde(default = "default_renewal_scan_interval")]
    pub renewal_scan_interval_secs: u64,

    #[serde(default = "default_cert_store")]
    pub cert_store: String,

    #[serde(default = "default_webroot")]
    pub webroot: String,

    #[serde(default = "default_acme_directory_url")]
    pub acme_directory_url: String,
}

impl Default for CertificateSettings {
    fn default() -> Self {
        Self {
            renewal_scan_interval_secs: default_renewal_scan_interval(),
            cert_store: default_cert_store(),
            webroot: default_webroot(),
            acme_directory_url: default_acme_directory_url(),
        }
    }
}

impl Settings {
    /// Load configuration from `{config_dir}/default.toml`, an optional
    /// per-`RUN_MODE` overlay, an optional `local.toml`, then `OPSLANE_*`
    /// environment variables — in that precedence order, matching the
    /// layering style of this crate's ambient config conventions.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = env::var("OPSLANE_CONFIG_DIR").unwrap_or_else(|_| "/config".into());

        let mut settings: Settings = Config::builder()
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(File::with_name(&format!("{config_dir}/{run_mode}")).required(false))
            .add_source(File::with_name(&format!("{config_dir}/local")).required(false))
            .add_source(Environment::with_prefix("OPSLANE").separator("__"))
            .build()?
            .try_deserialize()?;

        if let Ok(database_url) = env::var("DATABASE_URL") {
            if !database_url.is_empty() {
                settings.database.url = database_url;
            }
        }

        if settings.database.url.is_empty() {
            return Err(ConfigError::Message(
                "database URL not configured: set DATABASE_URL or [database] url in config".to_string(),
            ));
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_defaults_match_spec() {
        let defaults = ControllerSettings::default();
        assert_eq!(defaults.reconcile_interval_secs, 15);
        assert!(defaults.rollback_on_failure);
    }

    #[test]
    fn supervisor_default_tick_is_ten_seconds() {
        assert_eq!(SupervisorSettings::default().monitor_tick_secs, 10);
    }
}
