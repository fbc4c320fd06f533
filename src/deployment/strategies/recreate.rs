use super::{DeployedContainer, StrategyContext, StrategyOutcome};
use crate::deployment::health::poll_until_healthy;
use crate::deployment::progress::ProgressSink;

/// Stop, remove, then fully recreate a project's containers (spec.md §4.1
/// "Recreate"). Progress milestones: 10/20/40/60/80/100.
pub async fn run(ctx: &StrategyContext<'_>, sink: &dyn ProgressSink) -> anyhow::Result<StrategyOutcome> {
    sink.report(10, "stopping existing containers").await?;
    ctx.runtime.stop_project(ctx.project_name).await?;

    sink.report(20, "removing existing containers").await?;
    ctx.runtime.remove_project(ctx.project_name).await?;
    sink.event("services_stopped", None, "previous topology stopped and removed", serde_json::json!({}))
        .await?;

    sink.report(40, "starting new topology").await?;
    let topology_value = serde_json::to_value(ctx.topology)?;
    ctx.runtime.start_project(ctx.project_name, &topology_value).await?;

    let mut containers = Vec::new();
    for (service_name, spec) in &ctx.topology.services {
        let spec_value = serde_json::to_value(spec)?;
        let container_id = ctx.runtime.start_service(ctx.project_name, service_name, &spec_value).await?;
        containers.push(DeployedContainer {
            service_name: service_name.clone(),
            container_id,
        });
    }
    sink.event("services_started", None, "new topology started", serde_json::json!({}))
        .await?;

    sink.report(60, "waiting for containers to settle").await?;
    tokio::time::sleep(ctx.health_check_delay).await;

    sink.report(80, "polling container health").await?;
    for container in &containers {
        let healthy = poll_until_healthy(ctx.runtime, &container.container_id, ctx.health_check_retries).await?;
        if !healthy {
            anyhow::bail!("service {} failed to become healthy", container.service_name);
        }
    }

    sink.report(100, "deployment completed").await?;
    Ok(StrategyOutcome { containers })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::deployment::progress::RecordingProgressSink;
    use crate::deployment::topology::{RestartPolicy, ServiceSpec, Topology};
    use crate::drivers::fakes::FakeContainerRuntime;

    fn service_spec(image: &str) -> ServiceSpec {
        ServiceSpec {
            image: image.to_string(),
            ports: vec![],
            volumes: vec![],
            networks: vec![],
            depends_on: vec![],
            restart_policy: RestartPolicy::Always,
            healthcheck: None,
            resource_limits: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn recreate_happy_path_emits_stop_then_start_events() {
        let runtime = FakeContainerRuntime::new();
        let mut services = BTreeMap::new();
        services.insert("web".to_string(), service_spec("nginx:1.21"));
        let topology = Topology { services };
        let ctx = StrategyContext {
            runtime: &runtime,
            router: None,
            project_name: "p1",
            topology: &topology,
            health_check_delay: Duration::ZERO,
            health_check_retries: 1,
        };
        let sink = RecordingProgressSink::default();

        let outcome = run(&ctx, &sink).await.unwrap();

        assert_eq!(outcome.containers.len(), 1);
        assert_eq!(outcome.containers[0].service_name, "web");

        let event_types: Vec<String> = sink.events.lock().unwrap().iter().map(|(t, _, _)| t.clone()).collect();
        assert_eq!(event_types, vec!["services_stopped", "services_started"]);
    }
}
