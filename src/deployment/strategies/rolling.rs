use super::{DeployedContainer, StrategyContext, StrategyOutcome};
use crate::deployment::health::poll_until_healthy;
use crate::deployment::progress::ProgressSink;

/// Replace each service's containers one at a time, in lexicographic order
/// of service name (spec.md §4.1 "Rolling"). Progress advances by
/// `60 / service_count` per completed service.
pub async fn run(ctx: &StrategyContext<'_>, sink: &dyn ProgressSink) -> anyhow::Result<StrategyOutcome> {
    let service_count = ctx.topology.services.len().max(1) as i32;
    let increment = 60 / service_count;

    let mut containers = Vec::new();
    let mut progress = 0;

    for (service_name, spec) in &ctx.topology.services {
        sink.report(progress, &format!("rolling out {service_name}")).await?;
        sink.event(
            "service_updating",
            Some(service_name),
            &format!("rolling update started for {service_name}"),
            serde_json::json!({}),
        )
        .await?;

        let prior = ctx.runtime.get_service_containers(ctx.project_name, service_name).await?;

        let spec_value = serde_json::to_value(spec)?;
        let new_id = ctx
            .runtime
            .start_service(ctx.project_name, service_name, &spec_value)
            .await?;

        let healthy = poll_until_healthy(ctx.runtime, &new_id, ctx.health_check_retries).await?;
        if !healthy {
            ctx.runtime.stop_container(&new_id).await?;
            ctx.runtime.remove_container(&new_id).await?;
            anyhow::bail!("service {service_name} failed to become healthy during rolling update");
        }

        for old_id in prior.into_iter().filter(|id| id != &new_id) {
            ctx.runtime.stop_container(&old_id).await?;
            ctx.runtime.remove_container(&old_id).await?;
        }

        containers.push(DeployedContainer {
            service_name: service_name.clone(),
            container_id: new_id,
        });

        progress = (progress + increment).min(100);
        sink.report(progress, &format!("{service_name} rolled out")).await?;
    }

    sink.report(100, "rolling deployment completed").await?;
    Ok(StrategyOutcome { containers })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;
    use crate::deployment::progress::RecordingProgressSink;
    use crate::drivers::ContainerRuntime;
    use crate::deployment::topology::{RestartPolicy, ServiceSpec, Topology};
    use crate::drivers::fakes::FakeContainerRuntime;
    use crate::drivers::ContainerStatus;

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
    async fn rolling_emits_service_updating_for_each_service_in_order() {
        let runtime = FakeContainerRuntime::new();
        let mut services = BTreeMap::new();
        services.insert("api".to_string(), service_spec("api:1"));
        services.insert("web".to_string(), service_spec("web:1"));
        let topology = Topology { services };
        let ctx = StrategyContext {
            runtime: &runtime,
            router: None,
            project_name: "p2",
            topology: &topology,
            health_check_delay: Duration::ZERO,
            health_check_retries: 1,
        };
        let sink = RecordingProgressSink::default();

        let outcome = run(&ctx, &sink).await.unwrap();

        assert_eq!(outcome.containers.len(), 2);
        let updating: Vec<Option<String>> = sink
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|(event_type, _, _)| event_type == "service_updating")
            .map(|(_, service_name, _)| service_name.clone())
            .collect();
        assert_eq!(updating, vec![Some("api".to_string()), Some("web".to_string())]);
    }

    #[tokio::test]
    async fn rolling_health_failure_removes_new_container_and_keeps_prior() {
        let runtime = FakeContainerRuntime::new();
        let prior_id = runtime.start_service("p3", "web", &serde_json::json!({})).await.unwrap();
        runtime.fail_next_start("web");

        let mut services = BTreeMap::new();
        services.insert("web".to_string(), service_spec("web:2"));
        let topology = Topology { services };
        let ctx = StrategyContext {
            runtime: &runtime,
            router: None,
            project_name: "p3",
            topology: &topology,
            health_check_delay: Duration::ZERO,
            health_check_retries: 1,
        };
        let sink = RecordingProgressSink::default();

        let result = run(&ctx, &sink).await;

        assert!(result.is_err());
        assert_eq!(runtime.get_container_status(&prior_id).await.unwrap(), ContainerStatus::Running);
        let event_types: Vec<String> = sink.events.lock().unwrap().iter().map(|(t, _, _)| t.clone()).collect();
        assert!(event_types.contains(&"service_updating".to_string()));
    }
}
