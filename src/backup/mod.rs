mod controller;
mod retention;

pub use controller::BackupController;
pub use retention::sweep as sweep_retention;
