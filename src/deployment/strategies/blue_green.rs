use chrono::Utc;

use super::{DeployedContainer, StrategyContext, StrategyOutcome};
use crate::deployment::health::poll_until_healthy;
use crate::deployment::progress::ProgressSink;

/// Stand up the new topology under a derived `<name>-green-<unix>` project,
/// wait for full health, retire the original project, then swap traffic
/// (spec.md §4.1 "Blue/Green"). Requires a configured `TrafficRouter` — the
/// rename-vs-router-swap mechanism is deliberately left to that collaborator
/// (spec.md §9 Open Question); we fail fast rather than guess at one.
pub async fn run(ctx: &StrategyContext<'_>, sink: &dyn ProgressSink) -> anyhow::Result<StrategyOutcome> {
    let router = ctx
        .router
        .ok_or_else(|| anyhow::anyhow!("blue/green strategy requires a configured TrafficRouter"))?;

    let green_name = format!("{}-green-{}", ctx.project_name, Utc::now().timestamp());

    sink.report(10, &format!("starting green topology {green_name}")).await?;
    let topology_value = serde_json::to_value(ctx.topology)?;
    ctx.runtime.start_project(&green_name, &topology_value).await?;

    let mut containers = Vec::new();
    for (service_name, spec) in &ctx.topology.services {
        let spec_value = serde_json::to_value(spec)?;
        let container_id = ctx.runtime.start_service(&green_name, service_name, &spec_value).await?;
        containers.push(DeployedContainer {
            service_name: service_name.clone(),
            container_id,
        });
    }

    sink.report(50, "waiting for green topology health").await?;
    tokio::time::sleep(ctx.health_check_delay).await;

    for container in &containers {
        let healthy = poll_until_healthy(ctx.runtime, &container.container_id, ctx.health_check_retries).await?;
        if !healthy {
            sink.event(
                "blue_green_health_failed",
                Some(&container.service_name),
                "green topology failed health check, tearing down",
                serde_json::json!({ "green_project": green_name }),
            )
            .await?;
            ctx.runtime.stop_project(&green_name).await?;
            ctx.runtime.remove_project(&green_name).await?;
            anyhow::bail!("green topology failed health check for service {}", container.service_name);
        }
    }

    sink.report(70, "retiring previous topology").await?;
    if let Err(err) = ctx.runtime.stop_project(ctx.project_name).await {
        sink.event(
            "blue_green_retire_warning",
            None,
            &format!("failed to stop previous project cleanly: {err}"),
            serde_json::json!({}),
        )
        .await?;
    }
    if let Err(err) = ctx.runtime.remove_project(ctx.project_name).await {
        sink.event(
            "blue_green_retire_warning",
            None,
            &format!("failed to remove previous project cleanly: {err}"),
            serde_json::json!({}),
        )
        .await?;
    }

    sink.report(90, "swapping traffic binding").await?;
    let previous_binding = router.swap(ctx.project_name, &green_name).await?;
    sink.event(
        "traffic_swapped",
        None,
        "traffic binding swapped to green topology",
        serde_json::json!({ "green_project": green_name, "previous_binding": previous_binding }),
    )
    .await?;

    sink.report(100, "blue/green deployment completed").await?;
    Ok(StrategyOutcome { containers })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::deployment::progress::RecordingProgressSink;
    use crate::deployment::topology::{RestartPolicy, ServiceSpec, Topology};
    use crate::drivers::fakes::{FakeContainerRuntime, FakeTrafficRouter};

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
    async fn blue_green_without_router_fails_fast() {
        let runtime = FakeContainerRuntime::new();
        let mut services = BTreeMap::new();
        services.insert("web".to_string(), service_spec("web:1"));
        let topology = Topology { services };
        let ctx = StrategyContext {
            runtime: &runtime,
            router: None,
            project_name: "p4",
            topology: &topology,
            health_check_delay: Duration::ZERO,
            health_check_retries: 1,
        };
        let sink = RecordingProgressSink::default();

        let result = run(&ctx, &sink).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn blue_green_happy_path_swaps_traffic_and_retires_previous() {
        let runtime = FakeContainerRuntime::new();
        let router = FakeTrafficRouter::new();
        let mut services = BTreeMap::new();
        services.insert("web".to_string(), service_spec("web:2"));
        let topology = Topology { services };
        let ctx = StrategyContext {
            runtime: &runtime,
            router: Some(&router),
            project_name: "p5",
            topology: &topology,
            health_check_delay: Duration::ZERO,
            health_check_retries: 1,
        };
        let sink = RecordingProgressSink::default();

        let outcome = run(&ctx, &sink).await.unwrap();

        assert_eq!(outcome.containers.len(), 1);
        let event_types: Vec<String> = sink.events.lock().unwrap().iter().map(|(t, _, _)| t.clone()).collect();
        assert!(event_types.contains(&"traffic_swapped".to_string()));
    }
}
