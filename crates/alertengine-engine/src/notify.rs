use crate::error::Result;
use crate::evaluator::EvalRule;
use crate::metrics::EngineMetrics;
use crate::AlertSink;
use alertengine_common::config::Config;
use alertengine_common::labels::{format_labels, Labels};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Which side of a state change a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Firing,
    Resolved,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Firing => "firing",
            AlertState::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound alert payload. The gateway receives a JSON array of these.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub state: String,
    pub labels: Labels,
    pub annotations: HashMap<String, String>,
    pub value: f64,
    pub active_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fired_at: Option<String>,
}

impl Alert {
    pub fn from_rule(rule: &EvalRule, state: AlertState) -> Self {
        Self {
            state: state.as_str().to_string(),
            labels: rule.labels.clone(),
            annotations: rule.annotations.clone(),
            value: (rule.last_value * 100.0).round() / 100.0,
            active_at: rule.active_at.map(rfc3339).unwrap_or_default(),
            fired_at: rule.fired_at.map(rfc3339),
        }
    }
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Delivers alerts to the gateway webhook with a fixed retry budget.
///
/// Attempts are sequential with no backoff; only HTTP 200 counts as
/// delivered. After the last failed attempt the alert is dropped.
pub struct GatewayNotifier {
    client: reqwest::Client,
    url: String,
    auth_token: String,
    retries: u32,
    metrics: EngineMetrics,
}

impl GatewayNotifier {
    pub fn new(config: &Config, metrics: EngineMetrics) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}{}", config.gateway.url, config.gateway.notify_path),
            auth_token: config.auth_token.clone(),
            retries: config.notify_retries,
            metrics,
        })
    }
}

#[async_trait]
impl AlertSink for GatewayNotifier {
    async fn notify(&self, rule: &EvalRule, state: AlertState) {
        let alert = Alert::from_rule(rule, state);

        let body = match serde_json::to_vec(&[&alert]) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(rule_id = %rule.id, error = %e, "Failed to marshal alert");
                self.metrics.inc_notify_errors();
                return;
            }
        };

        tracing::info!(
            url = %self.url,
            rule_id = %rule.id,
            state = %state,
            value = alert.value,
            labels = %format_labels(&rule.labels),
            active_at = %alert.active_at,
            "Sending notification"
        );

        for attempt in 1..=self.retries {
            let result = self
                .client
                .post(&self.url)
                .header("Token", &self.auth_token)
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    tracing::debug!(url = %self.url, rule_id = %rule.id, "Notification delivered");
                    self.metrics.inc_notifications_sent();
                    return;
                }
                Ok(resp) => {
                    tracing::error!(
                        url = %self.url,
                        status = %resp.status(),
                        attempt,
                        "Notify failed"
                    );
                    self.metrics.inc_notify_errors();
                }
                Err(e) => {
                    tracing::error!(url = %self.url, attempt, error = %e, "Notify failed");
                    self.metrics.inc_notify_errors();
                }
            }
        }

        tracing::error!(
            rule_id = %rule.id,
            retries = self.retries,
            "Notification dropped after exhausting retries"
        );
    }
}

/// Sink used when notifications are disabled by configuration.
pub struct NoopSink;

#[async_trait]
impl AlertSink for NoopSink {
    async fn notify(&self, rule: &EvalRule, state: AlertState) {
        tracing::debug!(rule_id = %rule.id, state = %state, "Notification suppressed");
    }
}
