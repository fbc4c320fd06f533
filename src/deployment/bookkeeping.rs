use crate::db::models::HealingConfig;
use crate::deployment::topology::{parse_duration_or, RestartPolicy, ServiceSpec};

/// Derive a supervisor registration config from a service's restart policy
/// and healthcheck block (spec.md §4.1 "Post-deploy bookkeeping").
pub fn derive_healing_config(spec: &ServiceSpec) -> HealingConfig {
    let mut config = HealingConfig::default();

    match spec.restart_policy {
        RestartPolicy::Always | RestartPolicy::UnlessStopped => {
            config.auto_restart = true;
            config.max_restarts = 10;
        }
        RestartPolicy::OnFailure => {
            config.auto_restart = true;
        }
        RestartPolicy::No => {
            config.auto_restart = false;
        }
    }

    if let Some(healthcheck) = &spec.healthcheck {
        config.check_interval = parse_duration_or(healthcheck.interval.as_deref(), config.check_interval);
        if let Some(retries) = healthcheck.retries {
            config.failure_threshold = retries;
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::topology::HealthCheckSpec;

    fn spec_with(restart_policy: RestartPolicy) -> ServiceSpec {
        ServiceSpec {
            image: "demo:1".to_string(),
            ports: vec![],
            volumes: vec![],
            networks: vec![],
            depends_on: vec![],
            restart_policy,
            healthcheck: None,
            resource_limits: serde_json::Value::Null,
        }
    }

    #[test]
    fn always_sets_ten_max_restarts() {
        let config = derive_healing_config(&spec_with(RestartPolicy::Always));
        assert!(config.auto_restart);
        assert_eq!(config.max_restarts, 10);
    }

    #[test]
    fn on_failure_enables_restart_without_raising_cap() {
        let config = derive_healing_config(&spec_with(RestartPolicy::OnFailure));
        assert!(config.auto_restart);
        assert_eq!(config.max_restarts, HealingConfig::default().max_restarts);
    }

    #[test]
    fn no_disables_auto_restart() {
        let config = derive_healing_config(&spec_with(RestartPolicy::No));
        assert!(!config.auto_restart);
    }

    #[test]
    fn healthcheck_overrides_interval_and_threshold() {
        let mut spec = spec_with(RestartPolicy::Always);
        spec.healthcheck = Some(HealthCheckSpec {
            interval: Some("15s".to_string()),
            retries: Some(5),
        });
        let config = derive_healing_config(&spec);
        assert_eq!(config.check_interval, std::time::Duration::from_secs(15));
        assert_eq!(config.failure_threshold, 5);
    }
}
