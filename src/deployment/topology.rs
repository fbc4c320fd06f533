use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Parsed view of a Project's topology — the output of the `ConfigParser`
/// collaborator (spec.md §6). The core treats most of this as opaque, but
/// needs structured access to restart policy and healthcheck to derive a
/// supervisor registration and to drive the rollout strategies.
///
/// `services` is a `BTreeMap` so iteration is lexicographic by service name,
/// matching the stable ordering the rolling strategy requires (spec.md §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub services: BTreeMap<String, ServiceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub image: String,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    pub healthcheck: Option<HealthCheckSpec>,
    #[serde(default)]
    pub resource_limits: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    Always,
    UnlessStopped,
    OnFailure,
    #[default]
    No,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    /// Duration string such as `"30s"`; unparseable values fall back to 30s
    /// (spec.md §4.1 "Post-deploy bookkeeping").
    pub interval: Option<String>,
    pub retries: Option<u32>,
}

impl Topology {
    pub fn from_value(value: &serde_json::Value) -> anyhow::Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// Parse a duration string like `"30s"`, `"10"`, `"2m"`. Falls back to the
/// supplied default on any parse failure rather than erroring — the
/// healthcheck interval derivation is best-effort (spec.md §4.1).
pub fn parse_duration_or(raw: Option<&str>, default: Duration) -> Duration {
    let Some(raw) = raw else { return default };
    let raw = raw.trim();

    let (digits, suffix) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, ""),
    };

    let Ok(value) = digits.parse::<u64>() else {
        return default;
    };

    match suffix {
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 3600),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(parse_duration_or(Some("45"), Duration::from_secs(30)), Duration::from_secs(45));
    }

    #[test]
    fn parses_minute_suffix() {
        assert_eq!(parse_duration_or(Some("2m"), Duration::from_secs(30)), Duration::from_secs(120));
    }

    #[test]
    fn falls_back_on_garbage() {
        assert_eq!(parse_duration_or(Some("banana"), Duration::from_secs(30)), Duration::from_secs(30));
    }

    #[test]
    fn falls_back_on_missing() {
        assert_eq!(parse_duration_or(None, Duration::from_secs(30)), Duration::from_secs(30));
    }

    #[test]
    fn services_parse_in_declared_order_but_iterate_sorted() {
        let value = serde_json::json!({
            "services": {
                "web": {"image": "web:1"},
                "api": {"image": "api:1"},
            }
        });
        let topology = Topology::from_value(&value).unwrap();
        let names: Vec<&str> = topology.services.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["api", "web"]);
    }
}
