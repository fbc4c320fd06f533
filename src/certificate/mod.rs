mod acme;
mod controller;
mod manual;
mod renewal;
mod self_signed;
mod x509;

pub use controller::{CertificateController, ManualMaterial};
pub use renewal::RenewalScanner;
