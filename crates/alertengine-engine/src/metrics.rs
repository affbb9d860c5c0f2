//! Process metrics, registered under the `alertengine` prefix and served
//! in Prometheus text format.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

/// Prometheus default histogram buckets.
const EVALUATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PromIdLabels {
    pub prom_id: String,
}

/// Handles to every engine metric. Cloning shares the underlying state;
/// the registry itself stays non-global so tests get a fresh one each.
#[derive(Clone)]
pub struct EngineMetrics {
    rules_loaded: Family<PromIdLabels, Gauge>,
    notifications_sent: Counter,
    notify_errors: Counter,
    reload_success: Counter,
    reload_errors: Counter,
    evaluation_duration: Histogram,
    active_managers: Gauge,
}

impl EngineMetrics {
    /// Create the metric set and register it with the given registry.
    pub fn new(registry: &mut Registry) -> Self {
        let rules_loaded = Family::<PromIdLabels, Gauge>::default();
        registry.register(
            "rules_loaded",
            "Number of loaded alert rules per metrics source",
            rules_loaded.clone(),
        );

        let notifications_sent = Counter::default();
        registry.register(
            "notifications_sent",
            "Total number of alert notifications sent",
            notifications_sent.clone(),
        );

        let notify_errors = Counter::default();
        registry.register(
            "notify_errors",
            "Total number of notification errors",
            notify_errors.clone(),
        );

        let reload_success = Counter::default();
        registry.register(
            "reload_success",
            "Total number of successful rule reloads",
            reload_success.clone(),
        );

        let reload_errors = Counter::default();
        registry.register(
            "reload_errors",
            "Total number of rule reload errors",
            reload_errors.clone(),
        );

        let evaluation_duration = Histogram::new(EVALUATION_BUCKETS.into_iter());
        registry.register(
            "evaluation_duration_seconds",
            "Duration of one rule evaluation tick in seconds",
            evaluation_duration.clone(),
        );

        let active_managers = Gauge::default();
        registry.register(
            "active_managers",
            "Number of active rule managers",
            active_managers.clone(),
        );

        Self {
            rules_loaded,
            notifications_sent,
            notify_errors,
            reload_success,
            reload_errors,
            evaluation_duration,
            active_managers,
        }
    }

    pub fn set_rules_loaded(&self, prom_id: i64, count: usize) {
        self.rules_loaded
            .get_or_create(&PromIdLabels {
                prom_id: prom_id.to_string(),
            })
            .set(count as i64);
    }

    pub fn rules_loaded(&self, prom_id: i64) -> i64 {
        self.rules_loaded
            .get_or_create(&PromIdLabels {
                prom_id: prom_id.to_string(),
            })
            .get()
    }

    pub fn inc_notifications_sent(&self) {
        self.notifications_sent.inc();
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent.get()
    }

    pub fn inc_notify_errors(&self) {
        self.notify_errors.inc();
    }

    pub fn notify_errors(&self) -> u64 {
        self.notify_errors.get()
    }

    pub fn inc_reload_success(&self) {
        self.reload_success.inc();
    }

    pub fn reload_success(&self) -> u64 {
        self.reload_success.get()
    }

    pub fn inc_reload_errors(&self) {
        self.reload_errors.inc();
    }

    pub fn reload_errors(&self) -> u64 {
        self.reload_errors.get()
    }

    pub fn observe_evaluation_duration(&self, seconds: f64) {
        self.evaluation_duration.observe(seconds);
    }

    pub fn set_active_managers(&self, count: usize) {
        self.active_managers.set(count as i64);
    }

    pub fn active_managers(&self) -> i64 {
        self.active_managers.get()
    }
}

/// Build a prefixed registry together with its metric handles.
pub fn new_registry() -> (Registry, EngineMetrics) {
    let mut registry = Registry::with_prefix("alertengine");
    let metrics = EngineMetrics::new(&mut registry);
    (registry, metrics)
}

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> String {
    let mut buffer = String::new();
    if encode(&mut buffer, registry).is_err() {
        tracing::error!("Failed to encode prometheus metrics");
        return String::new();
    }
    buffer
}

/// Content-Type for the `/metrics` response body.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
