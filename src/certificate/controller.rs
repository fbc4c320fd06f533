use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::certificate::{acme, manual, self_signed};
use crate::db::certificates;
use crate::db::models::{CertProvider, Certificate};
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, JobKind};
use crate::state::CoreState;
use crate::tenant::TenantContext;

/// User-supplied PEM pair for `provider=manual`.
pub struct ManualMaterial {
    pub cert_pem: String,
    pub key_pem: String,
}

fn domain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$").unwrap()
    })
}

/// Rejects anything that isn't a plausible DNS hostname before it reaches
/// an ACME directory or gets sanitized into a filesystem path.
fn validate_domain(domain: &str) -> CoreResult<()> {
    if domain.len() > 253 || !domain_pattern().is_match(domain) {
        return Err(CoreError::invalid_input(format!("'{domain}' is not a valid DNS hostname")));
    }
    Ok(())
}

/// Certificate Controller (spec.md §4.4): synchronous issuance across the
/// three providers, plus the on-disk atomic write/replace convention shared
/// by issuance and renewal.
pub struct CertificateController {
    state: Arc<CoreState>,
}

impl CertificateController {
    pub fn new(state: Arc<CoreState>) -> Self {
        Self { state }
    }

    fn publish(&self, job_id: Uuid, event_type: &str, message: &str) {
        self.state.event_bus.publish(Event {
            job_kind: JobKind::Certificate,
            job_id,
            event_type: event_type.to_string(),
            message: message.to_string(),
            details: serde_json::json!({}),
            occurred_at: chrono::Utc::now(),
        });
    }

    /// `Request(domain, email, provider) → certificate_id`.
    #[allow(clippy::too_many_arguments)]
    pub async fn request(
        &self,
        ctx: TenantContext,
        domain: &str,
        email: &str,
        provider: CertProvider,
        auto_renew: bool,
        renew_days_before: i32,
        manual_material: Option<ManualMaterial>,
    ) -> CoreResult<Uuid> {
        validate_domain(domain)?;

        let pending = certificates::create_pending(&self.state.db_pool, &ctx, domain, email, provider, auto_renew, renew_days_before).await?;

        match self.issue_and_persist(domain, email, provider, manual_material).await {
            Ok((cert_pem, key_pem, not_before, not_after)) => {
                let stored_key_pem = self.stored_key_pem(&key_pem)?;
                certificates::mark_valid(&self.state.db_pool, pending.id, &cert_pem, &stored_key_pem, not_before, not_after).await?;
                self.publish(pending.id, "certificate_issued", &format!("issued certificate for {domain}"));
                Ok(pending.id)
            }
            Err(err) => {
                certificates::mark_error(&self.state.db_pool, pending.id).await?;
                self.publish(pending.id, "certificate_issuance_failed", &err.to_string());
                Err(CoreError::DriverUnavailable(err.to_string()))
            }
        }
    }

    /// Encrypts `key_pem` for storage when a `KeyEncryptor` is configured;
    /// otherwise the store keeps it in plaintext.
    fn stored_key_pem(&self, key_pem: &str) -> anyhow::Result<String> {
        match &self.state.key_encryptor {
            Some(encryptor) => encryptor.encrypt(key_pem),
            None => Ok(key_pem.to_string()),
        }
    }

    /// `Renew` — re-issues using the same provider/domain/email, replacing
    /// the on-disk pair atomically so no request observes a partial write.
    pub async fn renew(&self, cert: &Certificate) -> anyhow::Result<Certificate> {
        let (cert_pem, key_pem, not_before, not_after) = self.issue_and_persist(&cert.domain, &cert.email, cert.provider, None).await?;
        let stored_key_pem = self.stored_key_pem(&key_pem)?;

        let updated = certificates::mark_valid(&self.state.db_pool, cert.id, &cert_pem, &stored_key_pem, not_before, not_after).await?;

        if let Some(router) = &self.state.traffic_router {
            if let Err(err) = router.reload().await {
                warn!(domain = %cert.domain, error = %err, "traffic router reload failed after certificate renewal");
            }
        }

        self.publish(cert.id, "certificate_renewed", &format!("renewed certificate for {}", cert.domain));
        Ok(updated)
    }

    async fn issue_and_persist(
        &self,
        domain: &str,
        email: &str,
        provider: CertProvider,
        manual_material: Option<ManualMaterial>,
    ) -> anyhow::Result<(String, String, chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> {
        let issued = match provider {
            CertProvider::Acme => acme::issue(&self.state.settings.certificate, domain, email).await?,
            CertProvider::SelfSigned => self_signed::generate(domain)?,
            CertProvider::Manual => {
                let material = manual_material.ok_or_else(|| anyhow::anyhow!("manual provider requires cert_pem/key_pem"))?;
                manual::validate_pair(&material.cert_pem, &material.key_pem)?;
                let (not_before, not_after) = crate::certificate::x509::validity_window(&material.cert_pem)?;
                acme::IssuedCertificate {
                    cert_pem: material.cert_pem,
                    key_pem: material.key_pem,
                    not_before,
                    not_after,
                }
            }
        };

        write_atomic_pair(&self.state.settings.certificate.cert_store, domain, &issued.cert_pem, &issued.key_pem).await?;

        info!(domain, provider = ?provider, "certificate issued");
        Ok((issued.cert_pem, issued.key_pem, issued.not_before, issued.not_after))
    }
}

fn sanitize_domain(domain: &str) -> String {
    domain.chars().map(|c| match c {
        '.' | '-' | ':' => '_',
        other => other,
    }).collect()
}

/// Writes `cert_store/<sanitized_domain>.{crt,key}` via temp file + rename
/// (spec.md §4.4 step 6, §4.4 "Renew": "replace on-disk files atomically").
async fn write_atomic_pair(cert_store: &str, domain: &str, cert_pem: &str, key_pem: &str) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(cert_store).await?;

    let sanitized = sanitize_domain(domain);
    let cert_path = Path::new(cert_store).join(format!("{sanitized}.crt"));
    let key_path = Path::new(cert_store).join(format!("{sanitized}.key"));

    write_then_rename(&cert_path, cert_pem.as_bytes(), 0o644).await?;
    write_then_rename(&key_path, key_pem.as_bytes(), 0o600).await?;

    Ok(())
}

async fn write_then_rename(final_path: &PathBuf, contents: &[u8], mode: u32) -> anyhow::Result<()> {
    let tmp_path = final_path.with_extension(format!("{}.tmp", Uuid::new_v4()));
    tokio::fs::write(&tmp_path, contents).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(mode)).await?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    match tokio::fs::rename(&tmp_path, final_path).await {
        Ok(()) => Ok(()),
        Err(err) => {
            tokio::fs::remove_file(&tmp_path).await.ok();
            error!(path = %final_path.display(), error = %err, "atomic rename failed");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_dots_dashes_and_colons() {
        assert_eq!(sanitize_domain("sub.my-host:8443"), "sub_my_host_8443");
    }

    #[test]
    fn validate_domain_accepts_plausible_hostnames() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("sub.example.co").is_ok());
    }

    #[test]
    fn validate_domain_rejects_garbage() {
        assert!(validate_domain("not a domain").is_err());
        assert!(validate_domain("http://example.com").is_err());
        assert!(validate_domain("").is_err());
    }
}
