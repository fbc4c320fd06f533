use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use instant_acme::{Account, AuthorizationStatus, ChallengeType, Identifier, NewAccount, NewOrder, OrderStatus};
use rcgen::{CertificateParams, DistinguishedName, KeyPair};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::settings::CertificateSettings;

/// Issued key/cert material plus the validity window parsed from the leaf.
pub struct IssuedCertificate {
    pub cert_pem: String,
    pub key_pem: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

const ORDER_POLL_INTERVAL: Duration = Duration::from_secs(5);
const ORDER_POLL_ATTEMPTS: u32 = 24;
const CERT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const CERT_POLL_ATTEMPTS: u32 = 30;

/// Issues a certificate for `domain` via ACME HTTP-01 (spec.md §4.4
/// "Request" step 1-7): the challenge response is written to
/// `<webroot>/.well-known/acme-challenge/<token>` and cleaned up with a
/// file removal once the authorization is validated.
pub async fn issue(settings: &CertificateSettings, domain: &str, email: &str) -> Result<IssuedCertificate> {
    let account = init_account(settings, email).await?;

    let identifier = Identifier::Dns(domain.to_string());
    let mut order = account
        .new_order(&NewOrder {
            identifiers: &[identifier],
        })
        .await
        .context("failed to create ACME order")?;

    info!(domain, "created ACME order");

    let authorizations = order.authorizations().await.context("failed to fetch authorizations")?;

    for authz in &authorizations {
        if authz.status == AuthorizationStatus::Valid {
            continue;
        }

        let challenge = authz
            .challenges
            .iter()
            .find(|c| c.r#type == ChallengeType::Http01)
            .context("no HTTP-01 challenge offered")?;

        let key_authorization = order.key_authorization(challenge);
        let token = challenge.token.clone();
        let challenge_path = challenge_file_path(settings, &token);

        if let Some(parent) = challenge_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&challenge_path, key_authorization.as_str()).await?;

        let result = complete_authorization(&mut order, &challenge.url, &challenge_path).await;

        tokio::fs::remove_file(&challenge_path).await.ok();
        result?;
    }

    wait_for_order_ready(&mut order).await?;

    info!(domain, "generating CSR");
    let mut params = CertificateParams::new(vec![domain.to_string()])?;
    params.distinguished_name = DistinguishedName::new();
    let key_pair = KeyPair::generate()?;
    let csr = params.serialize_request(&key_pair)?;

    order.finalize(csr.der()).await.context("failed to finalize ACME order")?;

    let cert_chain_pem = wait_for_certificate(&mut order).await?;
    let key_pem = key_pair.serialize_pem();

    let (not_before, not_after) = crate::certificate::x509::validity_window(&cert_chain_pem)?;

    Ok(IssuedCertificate {
        cert_pem: cert_chain_pem,
        key_pem,
        not_before,
        not_after,
    })
}

async fn init_account(settings: &CertificateSettings, email: &str) -> Result<Account> {
    info!(directory = %settings.acme_directory_url, "initializing ACME account");

    let (account, _credentials) = Account::create(
        &NewAccount {
            contact: &[&format!("mailto:{email}")],
            terms_of_service_agreed: true,
            only_return_existing: false,
        },
        &settings.acme_directory_url,
        None,
    )
    .await
    .context("failed to register ACME account")?;

    Ok(account)
}

async fn complete_authorization(
    order: &mut instant_acme::Order,
    challenge_url: &str,
    challenge_path: &PathBuf,
) -> Result<()> {
    tokio::fs::metadata(challenge_path).await.context("challenge file not written")?;

    order.set_challenge_ready(challenge_url).await.context("failed to notify ACME server")?;

    let mut attempts = 0;
    loop {
        sleep(ORDER_POLL_INTERVAL).await;
        let state = order.refresh().await.context("failed to refresh order")?;

        match state.status {
            OrderStatus::Ready | OrderStatus::Valid => return Ok(()),
            OrderStatus::Invalid => anyhow::bail!("authorization became invalid"),
            OrderStatus::Pending | OrderStatus::Processing => {
                attempts += 1;
                if attempts > ORDER_POLL_ATTEMPTS {
                    anyhow::bail!("authorization validation timed out");
                }
                debug!(status = ?state.status, "waiting for authorization");
            }
        }
    }
}

async fn wait_for_order_ready(order: &mut instant_acme::Order) -> Result<()> {
    let state = order.refresh().await?;
    if matches!(state.status, OrderStatus::Ready | OrderStatus::Valid) {
        return Ok(());
    }
    if state.status == OrderStatus::Invalid {
        anyhow::bail!("order is invalid");
    }
    Ok(())
}

async fn wait_for_certificate(order: &mut instant_acme::Order) -> Result<String> {
    let mut attempts = 0;
    loop {
        sleep(CERT_POLL_INTERVAL).await;
        let state = order.refresh().await.context("failed to refresh order")?;

        match state.status {
            OrderStatus::Valid => {
                return order
                    .certificate()
                    .await
                    .context("failed to download certificate")?
                    .context("certificate not yet available");
            }
            OrderStatus::Invalid => anyhow::bail!("order became invalid during certificate download"),
            OrderStatus::Processing => {
                attempts += 1;
                if attempts > CERT_POLL_ATTEMPTS {
                    anyhow::bail!("certificate download timed out");
                }
            }
            _ => {}
        }
    }
}

fn challenge_file_path(settings: &CertificateSettings, token: &str) -> PathBuf {
    PathBuf::from(&settings.webroot).join(".well-known/acme-challenge").join(token)
}
