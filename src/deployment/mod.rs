mod bookkeeping;
mod controller;
mod health;
mod progress;
pub mod state_machine;
mod strategies;
mod topology;

pub use controller::DeploymentController;
