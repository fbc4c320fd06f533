mod monitor;
mod registration;

pub use monitor::Supervisor;
