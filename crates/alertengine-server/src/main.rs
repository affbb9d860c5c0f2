use alertengine_common::config::Config;
use alertengine_engine::metrics;
use alertengine_engine::notify::{GatewayNotifier, NoopSink};
use alertengine_engine::reloader::Reloader;
use alertengine_engine::AlertSink;
use alertengine_rule::RuleArchive;
use alertengine_server::app::{self, AppState};
use alertengine_server::logging;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::{interval, Duration};

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  alertengine [config.toml]    Start the engine");
    eprintln!("  alertengine --version        Show version information");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some("--version" | "-V") => {
            println!("alertengine {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/alertengine.toml");

    let config = Config::load(config_path)?;
    config.validate()?;
    logging::init(&config.log)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = config_path,
        "Starting alert engine"
    );

    let config = Arc::new(config);
    let archive = Arc::new(RuleArchive::new(
        &config.storage.rule_dir,
        config.storage.retention_days,
        config.storage.enable_history,
    )?);

    let (registry, engine_metrics) = metrics::new_registry();
    let registry = Arc::new(registry);

    let sink: Arc<dyn AlertSink> = if config.enable_notify {
        Arc::new(GatewayNotifier::new(&config, engine_metrics.clone())?)
    } else {
        tracing::warn!("Alert notifications disabled by configuration");
        Arc::new(NoopSink)
    };

    let reloader = Arc::new(Reloader::new(
        config.clone(),
        archive.clone(),
        engine_metrics,
        sink,
    )?);

    // Health/readiness/metrics surface
    let state = AppState {
        reloader: reloader.clone(),
        registry,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Starting metrics server");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app::build_http_app(state)).await {
            tracing::error!(error = %e, "Metrics server failed");
        }
    });

    if config.storage.enable_history {
        tokio::spawn(run_cleanup_task(archive));
    }

    reloader.run().await;
    let loop_handle = {
        let reloader = reloader.clone();
        tokio::spawn(async move { reloader.run_loop().await })
    };

    wait_for_shutdown().await;
    tracing::info!("Received shutdown signal");

    reloader.stop().await;
    let _ = loop_handle.await;

    tracing::info!("Alert engine stopped");
    Ok(())
}

/// Daily sweep of expired rule history files.
async fn run_cleanup_task(archive: Arc<RuleArchive>) {
    let mut tick = interval(Duration::from_secs(24 * 60 * 60));
    tick.tick().await;
    loop {
        tick.tick().await;
        tracing::info!("Starting cleanup task");
        match archive.cleanup_old_versions() {
            Ok(deleted) => tracing::info!(deleted, "Cleanup completed"),
            Err(e) => tracing::error!(error = %e, "Cleanup failed"),
        }
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
