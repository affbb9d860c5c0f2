use crate::duration::parse_duration;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

/// Engine configuration, loaded from a TOML file. A missing file yields
/// the defaults; a present file only needs to override what it cares
/// about. Durations are suffixed strings (`"30s"`, `"5m"`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Attempts per outbound alert notification.
    #[serde(default = "default_notify_retries")]
    pub notify_retries: u32,

    #[serde(default)]
    pub gateway: GatewayConfig,

    /// How often each source's ruleset is evaluated.
    #[serde(
        default = "default_evaluation_interval",
        deserialize_with = "de_duration"
    )]
    pub evaluation_interval: Duration,

    /// How often the rule and source lists are refetched from the gateway.
    #[serde(default = "default_reload_interval", deserialize_with = "de_duration")]
    pub reload_interval: Duration,

    /// Token sent to the gateway and the metrics backends.
    #[serde(default)]
    pub auth_token: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Port for the health/readiness/metrics HTTP surface.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// When false, alert notifications are dropped at the sink.
    #[serde(default = "default_enable_notify")]
    pub enable_notify: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub url: String,
    #[serde(default = "default_rule_path")]
    pub rule_path: String,
    #[serde(default = "default_prom_path")]
    pub prom_path: String,
    #[serde(default = "default_notify_path")]
    pub notify_path: String,
    #[serde(default = "default_gateway_timeout", deserialize_with = "de_duration")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Base directory for archived ruleset snapshots.
    pub rule_dir: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_enable_history")]
    pub enable_history: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
    /// json or console
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Log file path; empty logs to stdout.
    #[serde(default)]
    pub output_path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config: failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Config: failed to parse: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config: {0}")]
    Invalid(String),
}

fn de_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_duration(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{s}'")))
}

fn default_notify_retries() -> u32 {
    3
}

fn default_evaluation_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_reload_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_enable_notify() -> bool {
    true
}

fn default_rule_path() -> String {
    "/api/v1/rules".to_string()
}

fn default_prom_path() -> String {
    "/api/v1/proms".to_string()
}

fn default_notify_path() -> String {
    "/api/v1/alerts".to_string()
}

fn default_gateway_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_retention_days() -> u32 {
    30
}

fn default_enable_history() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notify_retries: default_notify_retries(),
            gateway: GatewayConfig::default(),
            evaluation_interval: default_evaluation_interval(),
            reload_interval: default_reload_interval(),
            auth_token: String::new(),
            storage: StorageConfig::default(),
            log: LogConfig::default(),
            metrics_port: default_metrics_port(),
            enable_notify: default_enable_notify(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:32002".to_string(),
            rule_path: default_rule_path(),
            prom_path: default_prom_path(),
            notify_path: default_notify_path(),
            timeout: default_gateway_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            rule_dir: "/var/lib/alertengine/rules".to_string(),
            retention_days: default_retention_days(),
            enable_history: default_enable_history(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            output_path: String::new(),
        }
    }
}

impl Config {
    /// Load from a TOML file. A non-existent path yields the defaults so a
    /// fresh deployment can run against a local gateway without a file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.url.is_empty() {
            return Err(ConfigError::Invalid("gateway.url cannot be empty".into()));
        }
        if self.evaluation_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "evaluation_interval must be positive".into(),
            ));
        }
        if self.reload_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "reload_interval must be positive".into(),
            ));
        }
        if self.storage.rule_dir.is_empty() {
            return Err(ConfigError::Invalid(
                "storage.rule_dir cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.notify_retries, 3);
        assert_eq!(config.evaluation_interval, Duration::from_secs(30));
        assert_eq!(config.reload_interval, Duration::from_secs(300));
        assert_eq!(config.gateway.rule_path, "/api/v1/rules");
        assert!(config.enable_notify);
    }

    #[test]
    fn parse_full_file() {
        let toml = r#"
notify_retries = 2
evaluation_interval = "15s"
reload_interval = "1m"
auth_token = "secret"
metrics_port = 9091
enable_notify = false

[gateway]
url = "http://gw:32002"
timeout = "5s"

[storage]
rule_dir = "/tmp/rules"
retention_days = 7
enable_history = false

[log]
level = "debug"
format = "console"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.notify_retries, 2);
        assert_eq!(config.evaluation_interval, Duration::from_secs(15));
        assert_eq!(config.reload_interval, Duration::from_secs(60));
        assert_eq!(config.gateway.url, "http://gw:32002");
        assert_eq!(config.gateway.timeout, Duration::from_secs(5));
        assert_eq!(config.gateway.notify_path, "/api/v1/alerts");
        assert_eq!(config.storage.retention_days, 7);
        assert!(!config.storage.enable_history);
        assert!(!config.enable_notify);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn invalid_duration_rejected() {
        let toml = r#"
evaluation_interval = "soon"
[gateway]
url = "http://gw"
[storage]
rule_dir = "/tmp/rules"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn empty_gateway_url_rejected() {
        let mut config = Config::default();
        config.gateway.url = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gateway.url"));
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = Config::default();
        config.evaluation_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_rule_dir_rejected() {
        let mut config = Config::default();
        config.storage.rule_dir = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rule_dir"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load("/nonexistent/alertengine.toml").unwrap();
        assert_eq!(config.metrics_port, 9090);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[gateway]\nurl = \"http://gw\"\n[storage]\nrule_dir = \"/tmp/r\"\n",
        )
        .unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.gateway.url, "http://gw");
    }
}
