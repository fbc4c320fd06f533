use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::certificate::controller::CertificateController;
use crate::db::certificates;
use crate::events::{Event, JobKind};
use crate::state::CoreState;

/// Scheduled certificate renewal scan (spec.md §4.4 "Scheduled scan"):
/// periodically renews any certificate within its renewal window, reloading
/// the traffic router on success and marking `status=error` plus an alert
/// on failure.
pub struct RenewalScanner {
    state: Arc<CoreState>,
    controller: Arc<CertificateController>,
}

impl RenewalScanner {
    pub fn new(state: Arc<CoreState>, controller: Arc<CertificateController>) -> Self {
        Self { state, controller }
    }

    pub fn start(self: Arc<Self>) {
        let interval = Duration::from_secs(self.state.settings.certificate.renewal_scan_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(err) = self.scan().await {
                    error!(error = %err, "certificate renewal scan failed");
                }
            }
        });
    }

    pub async fn scan(&self) -> anyhow::Result<()> {
        let due = certificates::find_due_for_renewal(&self.state.db_pool).await?;
        if due.is_empty() {
            return Ok(());
        }

        info!(count = due.len(), "certificates due for renewal");

        for cert in due {
            match self.controller.renew(&cert).await {
                Ok(renewed) => {
                    info!(domain = %renewed.domain, expiry = ?renewed.expiry_date, "certificate renewed");
                }
                Err(err) => {
                    warn!(domain = %cert.domain, error = %err, "certificate renewal failed");
                    if let Err(mark_err) = certificates::mark_error(&self.state.db_pool, cert.id).await {
                        error!(domain = %cert.domain, error = %mark_err, "failed to mark certificate errored");
                    }
                    self.state.event_bus.publish(Event {
                        job_kind: JobKind::Certificate,
                        job_id: cert.id,
                        event_type: "certificate_renewal_failed".to_string(),
                        message: err.to_string(),
                        details: serde_json::json!({ "domain": cert.domain }),
                        occurred_at: chrono::Utc::now(),
                    });
                    self.alert_renewal_failure(&cert.domain, &err).await;
                }
            }
        }

        Ok(())
    }

    async fn alert_renewal_failure(&self, domain: &str, err: &anyhow::Error) {
        use crate::drivers::{Alert, AlertLevel};

        let alert = Alert {
            level: AlertLevel::Error,
            title: "certificate renewal failed".to_string(),
            message: format!("{domain}: {err}"),
            container_id: None,
            service_name: None,
            project_name: None,
            timestamp: chrono::Utc::now(),
            details: serde_json::json!({ "domain": domain }),
        };

        if let Err(notify_err) = self.state.notifier.send_alert(alert).await {
            error!(domain, error = %notify_err, "failed to dispatch renewal-failure alert");
        }
    }
}
