use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{CertProvider, CertStatus, Certificate};
use crate::error::CoreResult;
use crate::tenant::TenantContext;

#[allow(clippy::too_many_arguments)]
pub async fn create_pending(
    pool: &sqlx::PgPool,
    ctx: &TenantContext,
    domain: &str,
    email: &str,
    provider: CertProvider,
    auto_renew: bool,
    renew_days_before: i32,
) -> CoreResult<Certificate> {
    let cert = sqlx::query_as::<_, Certificate>(
        r#"
        INSERT INTO ssl_certs
            (id, tenant_id, owner_id, domain, email, provider, status, cert_pem, key_pem,
             issue_date, expiry_date, auto_renew, renew_days_before, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, NULL, NULL, NULL, $8, $9, now(), now())
        RETURNING id, tenant_id, owner_id, domain, email, provider, status, cert_pem, key_pem,
                  issue_date, expiry_date, auto_renew, renew_days_before, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(ctx.tenant_id)
    .bind(ctx.owner_id)
    .bind(domain)
    .bind(email)
    .bind(provider)
    .bind(CertStatus::Pending)
    .bind(auto_renew)
    .bind(renew_days_before)
    .fetch_one(pool)
    .await?;

    Ok(cert)
}

#[allow(clippy::too_many_arguments)]
pub async fn mark_valid(
    pool: &sqlx::PgPool,
    id: Uuid,
    cert_pem: &str,
    key_pem: &str,
    issue_date: DateTime<Utc>,
    expiry_date: DateTime<Utc>,
) -> CoreResult<Certificate> {
    let cert = sqlx::query_as::<_, Certificate>(
        r#"
        UPDATE ssl_certs
        SET status = $2, cert_pem = $3, key_pem = $4, issue_date = $5, expiry_date = $6, updated_at = now()
        WHERE id = $1
        RETURNING id, tenant_id, owner_id, domain, email, provider, status, cert_pem, key_pem,
                  issue_date, expiry_date, auto_renew, renew_days_before, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(CertStatus::Valid)
    .bind(cert_pem)
    .bind(key_pem)
    .bind(issue_date)
    .bind(expiry_date)
    .fetch_one(pool)
    .await?;

    Ok(cert)
}

pub async fn mark_error(pool: &sqlx::PgPool, id: Uuid) -> CoreResult<Certificate> {
    let cert = sqlx::query_as::<_, Certificate>(
        r#"
        UPDATE ssl_certs SET status = $2, updated_at = now() WHERE id = $1
        RETURNING id, tenant_id, owner_id, domain, email, provider, status, cert_pem, key_pem,
                  issue_date, expiry_date, auto_renew, renew_days_before, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(CertStatus::Error)
    .fetch_one(pool)
    .await?;

    Ok(cert)
}

pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Certificate>> {
    let cert = sqlx::query_as::<_, Certificate>(
        r#"
        SELECT id, tenant_id, owner_id, domain, email, provider, status, cert_pem, key_pem,
               issue_date, expiry_date, auto_renew, renew_days_before, created_at, updated_at
        FROM ssl_certs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to find certificate")?;

    Ok(cert)
}

/// Certificates due for renewal: `status=valid AND auto_renew AND now +
/// renew_days_before >= expiry_date` (spec.md §4.4 "Scheduled scan").
pub async fn find_due_for_renewal(pool: &sqlx::PgPool) -> Result<Vec<Certificate>> {
    let certs = sqlx::query_as::<_, Certificate>(
        r#"
        SELECT id, tenant_id, owner_id, domain, email, provider, status, cert_pem, key_pem,
               issue_date, expiry_date, auto_renew, renew_days_before, created_at, updated_at
        FROM ssl_certs
        WHERE status = 'valid' AND auto_renew = true
          AND expiry_date IS NOT NULL
          AND now() + make_interval(days => renew_days_before) >= expiry_date
        "#,
    )
    .fetch_all(pool)
    .await
    .context("failed to find certificates due for renewal")?;

    Ok(certs)
}
