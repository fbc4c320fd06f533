//! In-memory driver implementations used by this crate's own test suite and
//! exposed to downstream integration tests behind the `testing` feature.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::collections::{HashMap, HashSet};

use super::{Alert, ContainerInfo, ContainerRuntime, ContainerStatus, Notifier, SourceDriver, StorageBackend, TrafficRouter};
use crate::db::models::BackupPolicy;

#[derive(Default)]
pub struct FakeContainerRuntime {
    containers: Mutex<HashMap<String, ContainerInfo>>,
    next_id: Mutex<u64>,
    fail_on_start: Mutex<HashSet<String>>,
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, id: &str, status: ContainerStatus) {
        if let Some(info) = self.containers.lock().unwrap().get_mut(id) {
            info.status = status;
        }
    }

    /// Makes the next `start_service` call for `service` come up `exited`
    /// instead of `running`, for tests simulating a failed rollout.
    pub fn fail_next_start(&self, service: &str) {
        self.fail_on_start.lock().unwrap().insert(service.to_string());
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn start_project(&self, _name: &str, _topology: &Value) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop_project(&self, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn remove_project(&self, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start_service(&self, project: &str, service: &str, _spec: &Value) -> anyhow::Result<String> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = format!("fake-{project}-{service}-{next_id}");
        let status = if self.fail_on_start.lock().unwrap().remove(service) {
            ContainerStatus::Exited
        } else {
            ContainerStatus::Running
        };
        self.containers.lock().unwrap().insert(
            id.clone(),
            ContainerInfo {
                id: id.clone(),
                name: format!("{project}_{service}"),
                image: "fake".to_string(),
                status,
                health: None,
                started_at: Some(chrono::Utc::now()),
            },
        );
        Ok(id)
    }

    async fn stop_container(&self, id: &str) -> anyhow::Result<()> {
        self.set_status(id, ContainerStatus::Exited);
        Ok(())
    }

    async fn restart_container(&self, id: &str) -> anyhow::Result<()> {
        self.set_status(id, ContainerStatus::Running);
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> anyhow::Result<()> {
        self.containers.lock().unwrap().remove(id);
        Ok(())
    }

    async fn get_service_containers(&self, project: &str, service: &str) -> anyhow::Result<Vec<String>> {
        let prefix = format!("fake-{project}-{service}-");
        Ok(self
            .containers
            .lock()
            .unwrap()
            .keys()
            .filter(|id| id.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn get_container_status(&self, id: &str) -> anyhow::Result<ContainerStatus> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .get(id)
            .map(|info| info.status)
            .unwrap_or(ContainerStatus::Unknown))
    }

    async fn get_container_info(&self, id: &str) -> anyhow::Result<ContainerInfo> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such container: {id}"))
    }
}

#[derive(Default)]
pub struct FakeStorageBackend {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object with empty contents, for tests that only need
    /// `exists`/`list` to observe it without a real upload.
    pub fn seed(&self, remote_path: &str) {
        self.objects.lock().unwrap().insert(remote_path.to_string(), Vec::new());
    }
}

#[async_trait]
impl StorageBackend for FakeStorageBackend {
    async fn upload(&self, local_path: &str, _config: &Value) -> anyhow::Result<String> {
        let data = tokio::fs::read(local_path).await?;
        let remote = format!("fake://{}", local_path.trim_start_matches('/'));
        self.objects.lock().unwrap().insert(remote.clone(), data);
        Ok(remote)
    }

    async fn download(&self, remote_path: &str, local_path: &str, _config: &Value) -> anyhow::Result<()> {
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(remote_path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such object: {remote_path}"))?;
        tokio::fs::write(local_path, data).await?;
        Ok(())
    }

    async fn delete(&self, remote_path: &str, _config: &Value) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(remote_path);
        Ok(())
    }

    async fn exists(&self, remote_path: &str, _config: &Value) -> anyhow::Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(remote_path))
    }

    async fn list(&self, prefix: &str, _config: &Value) -> anyhow::Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeSourceDriver;

#[async_trait]
impl SourceDriver for FakeSourceDriver {
    async fn snapshot(&self, policy: &BackupPolicy) -> anyhow::Result<String> {
        let path = std::env::temp_dir().join(format!("fake_snapshot_{}", policy.id));
        tokio::fs::write(&path, b"fake snapshot").await?;
        Ok(path.to_string_lossy().into_owned())
    }

    async fn restore(&self, local_path: &str, _target: &Value) -> anyhow::Result<()> {
        tokio::fs::metadata(local_path).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<Alert>>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_alert(&self, alert: Alert) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(alert);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTrafficRouter {
    bindings: Mutex<HashMap<String, String>>,
}

impl FakeTrafficRouter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrafficRouter for FakeTrafficRouter {
    async fn swap(&self, from_project: &str, to_project: &str) -> anyhow::Result<String> {
        let previous = from_project.to_string();
        self.bindings
            .lock()
            .unwrap()
            .insert(to_project.to_string(), previous.clone());
        Ok(previous)
    }

    async fn restore(&self, previous_binding: &str) -> anyhow::Result<()> {
        self.bindings
            .lock()
            .unwrap()
            .retain(|_, v| v != previous_binding);
        Ok(())
    }

    async fn reload(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
