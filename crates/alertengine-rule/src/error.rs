/// Errors from the rule model and the archive.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Ruleset could not be rendered to YAML.
    #[error("Rule: YAML serialization failed: {0}")]
    Serialize(#[from] serde_yaml::Error),

    /// Filesystem failure in the archive.
    #[error("Rule: archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Version listing was requested while history is disabled.
    #[error("Rule: history is disabled")]
    HistoryDisabled,
}

/// Convenience `Result` alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
