//! Driver interfaces (spec §6): the plug points the core depends on but does
//! not implement. Concrete container runtimes, object stores, ACME servers,
//! and notification backends live outside this crate; tests and downstream
//! callers provide implementations of these traits.

mod container_runtime;
mod notifier;
mod source;
mod storage;
mod traffic_router;

pub use container_runtime::{ContainerInfo, ContainerRuntime, ContainerStatus};
pub use notifier::{Alert, AlertLevel, Notifier};
pub use source::SourceDriver;
pub use storage::StorageBackend;
pub use traffic_router::TrafficRouter;

#[cfg(any(test, feature = "testing"))]
pub mod fakes;
