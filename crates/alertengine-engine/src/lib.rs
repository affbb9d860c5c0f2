//! Reconciliation and evaluation pipeline.
//!
//! The [`reloader::Reloader`] periodically pulls the authoritative rule and
//! source lists from the gateway and converges the live set of per-source
//! [`manager::Manager`]s. Each manager ticks an [`evaluator::Evaluator`]
//! that queries the metrics backend, drives the per-rule firing state
//! machine, and emits state-change notifications through an [`AlertSink`].

pub mod error;
pub mod evaluator;
pub mod manager;
pub mod metrics;
pub mod notify;
pub mod query;
pub mod reloader;


use alertengine_common::labels::Labels;
use async_trait::async_trait;

pub use error::{EngineError, Result};
pub use evaluator::{EvalRule, RuleState};
pub use notify::AlertState;

/// One scalar observation returned by the metrics backend for an
/// evaluated expression, together with its series labels.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub value: f64,
    pub labels: Labels,
}

/// Query capability injected into evaluators.
///
/// `Ok(None)` means the expression matched no series this tick; an error
/// makes the evaluator skip the rule without touching its state.
/// Production binds the Prometheus HTTP API ([`query::PromApiQuery`]);
/// tests bind deterministic mocks.
#[async_trait]
pub trait MetricsQuery: Send + Sync {
    async fn query(&self, expr: &str) -> anyhow::Result<Option<Sample>>;
}

/// Notification sink invoked on firing and resolved transitions.
///
/// Delivery failures are the sink's own concern (retry, count, drop);
/// nothing propagates back into the evaluation loop.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, rule: &EvalRule, state: AlertState);
}
