use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, info};

use crate::alerts::{notifier::Notifier, types::Alert};
use crate::checks::types::{Anomaly, CheckResult};

/// Message body of an anomaly alert
#[derive(Debug, Serialize)]
struct AlertBody<'a> {
    check: &'a str,
    target: &'a str,
    anomalies: Vec<&'a Anomaly>,
}

/// Renders check results into alerts and hands them to the notifier.
///
/// Delivery is attempted once per target label. Failures are logged and
/// never returned to the caller.
#[derive(Debug, Clone)]
pub(crate) struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    subject: String,
}

impl AlertDispatcher {
    pub(crate) fn new(notifier: Arc<dyn Notifier>, subject: String) -> Self {
        Self { notifier, subject }
    }

    /// Render one alert per target label from the non-empty results
    pub(crate) fn render(&self, check: &str, results: &[CheckResult]) -> Vec<Alert> {
        let mut by_target: BTreeMap<String, Vec<&Anomaly>> = BTreeMap::new();
        for result in results.iter().filter(|r| !r.is_empty()) {
            by_target
                .entry(result.target.to_string())
                .or_default()
                .extend(result.anomalies.iter());
        }

        by_target
            .into_iter()
            .map(|(target, anomalies)| {
                let body = AlertBody {
                    check,
                    target: &target,
                    anomalies,
                };
                let message = serde_json::to_string_pretty(&body)
                    .unwrap_or_else(|e| format!("failed to render anomalies: {e}"));
                Alert {
                    subject: format!("{}: {check}", self.subject),
                    target: target.clone(),
                    message,
                }
            })
            .collect()
    }

    /// Dispatch the anomalies of `results`; returns the number of alerts delivered
    pub(crate) async fn dispatch(&self, check: &str, results: &[CheckResult]) -> usize {
        let alerts = self.render(check, results);
        let mut delivered = 0;

        for alert in &alerts {
            if self.deliver(alert).await {
                delivered += 1;
            }
        }

        if !alerts.is_empty() {
            info!(check, alerts = alerts.len(), delivered, "Dispatched alerts");
        }
        delivered
    }

    /// Send an informational report to `target`, regardless of anomalies
    pub(crate) async fn report<T: Serialize>(&self, name: &str, target: &str, report: &T) -> bool {
        let message = serde_json::to_string_pretty(report)
            .unwrap_or_else(|e| format!("failed to render report: {e}"));
        let alert = Alert {
            subject: format!("{}: {name}", self.subject),
            target: target.to_string(),
            message,
        };
        self.deliver(&alert).await
    }

    async fn deliver(&self, alert: &Alert) -> bool {
        match self.notifier.send(alert).await {
            Ok(()) => true,
            Err(e) => {
                error!(target_label = %alert.target, subject = %alert.subject, error = %e, "Failed to deliver alert");
                false
            }
        }
    }
}
