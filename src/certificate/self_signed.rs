use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};

use crate::certificate::acme::IssuedCertificate;

/// Generates a self-signed EC certificate (spec.md §4.4 "self_signed":
/// "1-year validity, CN=domain, SAN=[domain]").
pub fn generate(domain: &str) -> Result<IssuedCertificate> {
    let key_pair = KeyPair::generate()?;

    let mut params = CertificateParams::new(vec![domain.to_string()])?;
    params.distinguished_name = {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, domain);
        dn
    };
    params.subject_alt_names = vec![SanType::DnsName(domain.try_into()?)];

    let not_before: DateTime<Utc> = Utc::now();
    let not_after = not_before + Duration::days(365);
    params.not_before = time::OffsetDateTime::from_unix_timestamp(not_before.timestamp())?;
    params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.timestamp())?;

    let cert = params.self_signed(&key_pair)?;

    Ok(IssuedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        not_before,
        not_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_signed_cert_covers_one_year() {
        let issued = generate("example.test").unwrap();
        let span = issued.not_after - issued.not_before;
        assert_eq!(span.num_days(), 365);
        assert!(issued.cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(issued.key_pem.contains("PRIVATE KEY"));
    }
}
