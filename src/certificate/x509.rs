use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use x509_parser::prelude::*;

/// Parses the leaf certificate's validity window out of a PEM chain
/// (spec.md §4.4 step 7: "issue_date=NotBefore, expiry_date=NotAfter").
pub fn validity_window(cert_chain_pem: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(cert_chain_pem.as_bytes()).context("failed to parse PEM")?;
    let cert = pem.parse_x509().context("failed to parse leaf certificate")?;

    let not_before = asn1_time_to_utc(cert.validity().not_before)?;
    let not_after = asn1_time_to_utc(cert.validity().not_after)?;

    Ok((not_before, not_after))
}

fn asn1_time_to_utc(time: ASN1Time) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .context("certificate timestamp out of range")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_input() {
        assert!(validity_window("not a certificate").is_err());
    }
}
