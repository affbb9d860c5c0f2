use crate::metrics::EngineMetrics;
use crate::notify::AlertState;
use crate::{AlertSink, MetricsQuery};
use alertengine_common::duration::parse_for_duration;
use alertengine_common::labels::{merge_labels, Labels};
use alertengine_rule::Rule;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Instant};

/// Firing state of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    Inactive,
    Pending,
    Firing,
}

/// Runtime form of a rule, carrying its firing state between ticks.
///
/// `active_at` is set while the rule is pending or firing; `fired_at`
/// only while firing. Both are `None` in the inactive state.
#[derive(Debug, Clone)]
pub struct EvalRule {
    pub id: String,
    pub prom_id: i64,
    pub expr: String,
    pub for_duration: Duration,
    pub labels: Labels,
    pub annotations: HashMap<String, String>,
    pub state: RuleState,
    pub active_at: Option<DateTime<Utc>>,
    pub fired_at: Option<DateTime<Utc>>,
    pub last_value: f64,
}

impl EvalRule {
    pub fn from_rule(rule: &Rule) -> Self {
        Self {
            id: rule.id.to_string(),
            prom_id: rule.prom_id,
            expr: rule.full_expr(),
            for_duration: parse_for_duration(&rule.for_),
            labels: rule.labels.clone(),
            annotations: rule.annotations(),
            state: RuleState::Inactive,
            active_at: None,
            fired_at: None,
            last_value: 0.0,
        }
    }
}

/// Ticks the ruleset of one source against the metrics backend.
///
/// The ruleset mutex is held for a full tick and for the whole of
/// [`Evaluator::update_rules`], so updates never interleave with an
/// in-flight evaluation.
pub struct Evaluator {
    rules: Mutex<Vec<EvalRule>>,
    interval: Duration,
    query: Arc<dyn MetricsQuery>,
    sink: Arc<dyn AlertSink>,
    metrics: EngineMetrics,
    stop_rx: watch::Receiver<bool>,
    root_rx: watch::Receiver<bool>,
}

impl Evaluator {
    pub fn new(
        interval: Duration,
        query: Arc<dyn MetricsQuery>,
        sink: Arc<dyn AlertSink>,
        metrics: EngineMetrics,
        stop_rx: watch::Receiver<bool>,
        root_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            interval,
            query,
            sink,
            metrics,
            stop_rx,
            root_rx,
        }
    }

    /// Replace the ruleset, carrying firing state over for rules whose id
    /// survives the swap. Removed rules are dropped without a resolved
    /// notification: the gateway is authoritative for removals.
    pub async fn update_rules(&self, new_rules: Vec<EvalRule>) {
        let mut rules = self.rules.lock().await;
        let mut merged = new_rules;
        for rule in merged.iter_mut() {
            if let Some(prior) = rules.iter().find(|r| r.id == rule.id) {
                rule.state = prior.state;
                rule.active_at = prior.active_at;
                rule.fired_at = prior.fired_at;
                rule.last_value = prior.last_value;
            }
        }
        *rules = merged;
    }

    /// Spawn the tick loop. The first evaluation happens one interval
    /// after start; the task exits on either stop signal.
    pub fn run(self: &Arc<Self>) {
        let evaluator = self.clone();
        let mut stop_rx = self.stop_rx.clone();
        let mut root_rx = self.root_rx.clone();

        tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + evaluator.interval, evaluator.interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let started = Instant::now();
                        evaluator.evaluate_tick(Utc::now()).await;
                        evaluator
                            .metrics
                            .observe_evaluation_duration(started.elapsed().as_secs_f64());
                    }
                    _ = stop_rx.changed() => break,
                    _ = root_rx.changed() => break,
                }
            }
        });
    }

    /// Evaluate every rule once against `now`, in ruleset order.
    ///
    /// A query error skips that one rule for this tick. Once cancellation
    /// has been signalled the remaining rules are not evaluated and no
    /// further notifications are emitted.
    pub async fn evaluate_tick(&self, now: DateTime<Utc>) {
        let mut rules = self.rules.lock().await;

        for rule in rules.iter_mut() {
            if self.cancelled() {
                return;
            }

            let sample = match self.query.query(&rule.expr).await {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::debug!(rule_id = %rule.id, expr = %rule.expr, error = %e, "Query failed");
                    continue;
                }
            };

            if let Some(sample) = &sample {
                rule.last_value = sample.value;
                // Per-series dimensions win over configured labels.
                rule.labels = merge_labels(&rule.labels, &sample.labels);
            }

            if let Some((state, snapshot)) = advance(rule, sample.is_some(), now) {
                self.sink.notify(&snapshot, state).await;
            }
        }
    }

    fn cancelled(&self) -> bool {
        *self.stop_rx.borrow() || *self.root_rx.borrow()
    }

    #[cfg(test)]
    pub(crate) async fn rules_snapshot(&self) -> Vec<EvalRule> {
        self.rules.lock().await.clone()
    }
}

/// Advance the firing state machine for one rule.
///
/// Returns the notification to emit, with a snapshot taken before any
/// timestamps are cleared so resolved alerts still carry `active_at` and
/// `fired_at`. A rule whose `for` duration is zero passes through pending
/// and fires on the tick that first observed it.
fn advance(
    rule: &mut EvalRule,
    present: bool,
    now: DateTime<Utc>,
) -> Option<(AlertState, EvalRule)> {
    match (rule.state, present) {
        (RuleState::Inactive, true) => {
            rule.state = RuleState::Pending;
            rule.active_at = Some(now);
            if since_active(rule, now) >= rule.for_duration {
                fire(rule, now)
            } else {
                None
            }
        }
        (RuleState::Inactive, false) => None,

        (RuleState::Pending, true) => {
            if since_active(rule, now) >= rule.for_duration {
                fire(rule, now)
            } else {
                None
            }
        }
        (RuleState::Pending, false) => {
            rule.state = RuleState::Inactive;
            rule.active_at = None;
            None
        }

        // Repeat the firing notification every tick: the webhook is
        // expected to deduplicate, and continuous emission survives
        // webhook restarts.
        (RuleState::Firing, true) => Some((AlertState::Firing, rule.clone())),
        (RuleState::Firing, false) => {
            let snapshot = rule.clone();
            rule.state = RuleState::Inactive;
            rule.active_at = None;
            rule.fired_at = None;
            Some((AlertState::Resolved, snapshot))
        }
    }
}

fn fire(rule: &mut EvalRule, now: DateTime<Utc>) -> Option<(AlertState, EvalRule)> {
    rule.state = RuleState::Firing;
    rule.fired_at = Some(now);
    Some((AlertState::Firing, rule.clone()))
}

fn since_active(rule: &EvalRule, now: DateTime<Utc>) -> Duration {
    rule.active_at
        .map(|active_at| (now - active_at).to_std().unwrap_or_default())
        .unwrap_or_default()
}
