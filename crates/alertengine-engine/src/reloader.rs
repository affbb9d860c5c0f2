use crate::error::{EngineError, Result};
use crate::manager::Manager;
use crate::metrics::EngineMetrics;
use crate::AlertSink;
use alertengine_common::config::Config;
use alertengine_rule::{types, Prom, PromRules, PromsResp, RuleArchive, Rules, RulesResp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// Top-level control loop: reconciles the live set of per-source managers
/// against the gateway's declared rules and sources.
///
/// Managers are owned exclusively by the reloader; cancellation flows
/// downward through a shared watch channel and never back up.
pub struct Reloader {
    config: Arc<Config>,
    archive: Arc<RuleArchive>,
    metrics: EngineMetrics,
    sink: Arc<dyn AlertSink>,
    client: reqwest::Client,
    managers: RwLock<HashMap<i64, Manager>>,
    running: AtomicBool,
    root_tx: watch::Sender<bool>,
}

impl Reloader {
    pub fn new(
        config: Arc<Config>,
        archive: Arc<RuleArchive>,
        metrics: EngineMetrics,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.gateway.timeout)
            .build()?;
        let (root_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            archive,
            metrics,
            sink,
            client,
            managers: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            root_tx,
        })
    }

    /// Mark the reloader running and start any managers it already holds.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        for manager in self.managers.read().await.values() {
            manager.run();
        }
        tracing::info!("Reloader started");
    }

    /// Cancel the root scope and stop every manager. Idempotent.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.root_tx.send(true);
        for manager in self.managers.read().await.values() {
            manager.stop();
        }
        tracing::info!("Reloader stopped");
    }

    /// Reconcile once immediately, then on every reload interval until
    /// cancelled. Every iteration lands in exactly one of the reload
    /// counters.
    pub async fn run_loop(&self) {
        let mut root_rx = self.root_tx.subscribe();
        let mut tick = tokio::time::interval(self.config.reload_interval);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if !self.running.load(Ordering::SeqCst) {
                        return;
                    }
                    match self.update().await {
                        Ok(()) => self.metrics.inc_reload_success(),
                        Err(e) => {
                            tracing::error!(error = %e, "Rule reload failed");
                            self.metrics.inc_reload_errors();
                        }
                    }
                }
                _ = root_rx.changed() => return,
            }
        }
    }

    /// Fetch gateway state and converge the manager set.
    ///
    /// The sweep runs before any update so a source whose URL changed has
    /// its old manager torn down before the new one touches gauges keyed
    /// on the same `prom_id`.
    pub async fn update(&self) -> Result<()> {
        tracing::info!("Starting rule update");

        let groups = self.fetch_prom_rules().await?;

        let mut managers = self.managers.write().await;

        managers.retain(|_, manager| {
            let keep = groups.iter().any(|g| {
                g.prom.id == manager.prom().id
                    && g.prom.url == manager.prom().url
                    && !g.prom.url.is_empty()
            });
            if !keep {
                tracing::info!(
                    prom_id = manager.prom().id,
                    prom_url = %manager.prom().url,
                    "Removing obsolete manager"
                );
                manager.stop();
            }
            keep
        });

        for group in &groups {
            if group.prom.url.is_empty() {
                tracing::warn!(prom_id = group.prom.id, "Skipping source with empty URL");
                continue;
            }

            if !managers.contains_key(&group.prom.id) {
                let manager = match Manager::new(
                    group.prom.clone(),
                    &self.config,
                    self.archive.clone(),
                    self.metrics.clone(),
                    self.sink.clone(),
                    self.root_tx.subscribe(),
                ) {
                    Ok(manager) => manager,
                    Err(e) => {
                        tracing::error!(prom_id = group.prom.id, error = %e, "Failed to create manager");
                        continue;
                    }
                };
                manager.run();
                managers.insert(group.prom.id, manager);
            }

            if let Err(e) = managers[&group.prom.id].update(&group.rules).await {
                tracing::error!(prom_id = group.prom.id, error = %e, "Failed to update rules");
            }
        }

        self.metrics.set_active_managers(managers.len());
        tracing::info!(manager_count = managers.len(), "Rule update completed");
        Ok(())
    }

    /// Number of live managers, for the readiness probe.
    pub async fn manager_count(&self) -> usize {
        self.managers.read().await.len()
    }

    async fn fetch_prom_rules(&self) -> Result<Vec<PromRules>> {
        let rules = self.fetch_rules().await?;
        let proms = self.fetch_proms().await?;

        let mut groups = types::group_by_prom(&rules);
        for group in &mut groups {
            if let Some(prom) = proms.iter().find(|p| p.id == group.prom.id) {
                group.prom.url = prom.url.clone();
            }
        }
        Ok(groups)
    }

    async fn fetch_rules(&self) -> Result<Rules> {
        let url = format!("{}{}", self.config.gateway.url, self.config.gateway.rule_path);
        let resp: RulesResp = self
            .client
            .get(&url)
            .header("Token", &self.config.auth_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.code != 0 {
            return Err(EngineError::Api(resp.msg));
        }

        tracing::info!(count = resp.data.len(), "Rules fetched");
        Ok(resp.data)
    }

    async fn fetch_proms(&self) -> Result<Vec<Prom>> {
        let url = format!("{}{}", self.config.gateway.url, self.config.gateway.prom_path);
        let resp: PromsResp = self
            .client
            .get(&url)
            .header("Token", &self.config.auth_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.code != 0 {
            return Err(EngineError::Api(resp.msg));
        }

        tracing::info!(count = resp.data.len(), "Sources fetched");
        Ok(resp.data)
    }

    #[cfg(test)]
    pub(crate) async fn manager_prom(&self, prom_id: i64) -> Option<Prom> {
        self.managers
            .read()
            .await
            .get(&prom_id)
            .map(|m| m.prom().clone())
    }
}
