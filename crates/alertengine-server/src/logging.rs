use alertengine_common::config::LogConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber from the log section of the
/// config. `RUST_LOG` still takes precedence when set. An empty
/// `output_path` logs to stdout.
pub fn init(config: &LogConfig) -> Result<()> {
    let level = match config.level.as_str() {
        "debug" | "info" | "warn" | "error" => config.level.as_str(),
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("alertengine={level}")));
    let json = config.format == "json";

    if config.output_path.is_empty() {
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if json {
            builder.json().init();
        } else {
            builder.init();
        }
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.output_path)?;
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .with_ansi(false);
        if json {
            builder.json().init();
        } else {
            builder.init();
        }
    }

    Ok(())
}
