mod blue_green;
mod recreate;
mod rolling;

pub use blue_green::run as run_blue_green;
pub use recreate::run as run_recreate;
pub use rolling::run as run_rolling;

use std::time::Duration;

use crate::deployment::topology::Topology;
use crate::drivers::{ContainerRuntime, TrafficRouter};

/// Everything a strategy needs to drive the containers of one deployment
/// attempt (spec.md §4.1).
pub struct StrategyContext<'a> {
    pub runtime: &'a dyn ContainerRuntime,
    pub router: Option<&'a dyn TrafficRouter>,
    pub project_name: &'a str,
    pub topology: &'a Topology,
    pub health_check_delay: Duration,
    pub health_check_retries: u32,
}

/// One running container materialized by a strategy run.
pub struct DeployedContainer {
    pub service_name: String,
    pub container_id: String,
}

pub struct StrategyOutcome {
    pub containers: Vec<DeployedContainer>,
}
