use std::time::Duration;

use crate::drivers::{ContainerRuntime, ContainerStatus};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll a single container's status up to `retries` times at a fixed 5s
/// interval. Success iff status settles on `running`/`healthy`; exhausting
/// the retry budget or observing `exited`/`dead` (which short-circuits
/// immediately) is failure (spec.md §4.1 "Health poll").
pub async fn poll_until_healthy(
    runtime: &dyn ContainerRuntime,
    container_id: &str,
    retries: u32,
) -> anyhow::Result<bool> {
    for attempt in 0..retries.max(1) {
        let status = runtime.get_container_status(container_id).await?;
        match status {
            ContainerStatus::Running | ContainerStatus::Healthy => return Ok(true),
            ContainerStatus::Exited | ContainerStatus::Dead => return Ok(false),
            ContainerStatus::Unknown => {}
        }

        if attempt + 1 < retries {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    Ok(false)
}
