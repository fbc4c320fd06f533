use anyhow::{bail, Context, Result};
use rcgen::KeyPair;

/// Validates that a user-provided certificate and key form a matching pair
/// (spec.md §4.4 "manual": "validate that certificate and key match (public-key
/// equality)").
pub fn validate_pair(cert_pem: &str, key_pem: &str) -> Result<()> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem.as_bytes()).context("failed to parse certificate PEM")?;
    let cert = pem.parse_x509().context("failed to parse certificate")?;
    let cert_public_key = cert.public_key().raw;

    let key_pair = KeyPair::from_pem(key_pem).context("failed to parse private key PEM")?;
    let key_public_key = key_pair.public_key_der();

    if cert_public_key != key_public_key.as_slice() {
        bail!("certificate and key do not form a matching pair");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::self_signed;

    #[test]
    fn accepts_a_genuinely_matching_pair() {
        let issued = self_signed::generate("example.test").unwrap();
        validate_pair(&issued.cert_pem, &issued.key_pem).unwrap();
    }

    #[test]
    fn rejects_a_mismatched_pair() {
        let a = self_signed::generate("a.example.test").unwrap();
        let b = self_signed::generate("b.example.test").unwrap();
        assert!(validate_pair(&a.cert_pem, &b.key_pem).is_err());
    }
}
