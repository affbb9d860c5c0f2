use crate::evaluator::{EvalRule, Evaluator};
use crate::metrics::EngineMetrics;
use crate::query::PromApiQuery;
use crate::{AlertSink, Result};
use alertengine_common::config::Config;
use alertengine_rule::{types, Prom, RuleArchive, Rules};
use std::sync::Arc;
use tokio::sync::watch;

/// Per-source rule manager: owns the evaluator for one metrics source and
/// the archival side-write of every accepted ruleset.
pub struct Manager {
    prom: Prom,
    archive: Arc<RuleArchive>,
    evaluator: Arc<Evaluator>,
    metrics: EngineMetrics,
    stop_tx: watch::Sender<bool>,
}

impl Manager {
    /// Build a manager for one source. Fails when the source URL cannot
    /// back a query client; the reconciler logs and skips such sources.
    pub fn new(
        prom: Prom,
        config: &Config,
        archive: Arc<RuleArchive>,
        metrics: EngineMetrics,
        sink: Arc<dyn AlertSink>,
        root_rx: watch::Receiver<bool>,
    ) -> Result<Self> {
        let query = Arc::new(PromApiQuery::new(
            &prom.url,
            &config.auth_token,
            config.gateway.timeout,
        )?);

        let (stop_tx, stop_rx) = watch::channel(false);
        let evaluator = Arc::new(Evaluator::new(
            config.evaluation_interval,
            query,
            sink,
            metrics.clone(),
            stop_rx,
            root_rx,
        ));

        Ok(Self {
            prom,
            archive,
            evaluator,
            metrics,
            stop_tx,
        })
    }

    pub fn prom(&self) -> &Prom {
        &self.prom
    }

    /// Accept a new authoritative ruleset: snapshot it to the archive,
    /// swap it into the evaluator carrying per-rule state over by id, and
    /// refresh the per-source rule gauge. On error the evaluator keeps
    /// serving the prior ruleset.
    pub async fn update(&self, rules: &Rules) -> Result<()> {
        let content = types::rules_content(rules).map_err(|e| {
            tracing::error!(prom_id = self.prom.id, error = %e, "Failed to render ruleset");
            e
        })?;

        self.archive.save(self.prom.id, &content).map_err(|e| {
            tracing::error!(prom_id = self.prom.id, error = %e, "Failed to save rule file");
            e
        })?;

        let eval_rules: Vec<EvalRule> = rules.iter().map(EvalRule::from_rule).collect();
        self.evaluator.update_rules(eval_rules).await;
        self.metrics.set_rules_loaded(self.prom.id, rules.len());

        tracing::info!(
            prom_id = self.prom.id,
            rule_count = rules.len(),
            "Rules updated"
        );
        Ok(())
    }

    /// Start the evaluation loop; returns immediately.
    pub fn run(&self) {
        tracing::info!(prom_id = self.prom.id, prom_url = %self.prom.url, "Starting rule manager");
        self.evaluator.run();
    }

    /// Signal the evaluation loop to exit at its next suspension point.
    /// Idempotent.
    pub fn stop(&self) {
        tracing::info!(prom_id = self.prom.id, "Stopping rule manager");
        let _ = self.stop_tx.send(true);
    }

    #[cfg(test)]
    pub(crate) fn evaluator(&self) -> &Arc<Evaluator> {
        &self.evaluator
    }
}
