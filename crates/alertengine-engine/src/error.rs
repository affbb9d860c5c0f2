use alertengine_rule::RuleError;

/// Errors from the reconciliation and evaluation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Gateway or backend HTTP failure (transport, timeout, non-2xx,
    /// body decode).
    #[error("Engine: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-zero envelope code.
    #[error("Engine: gateway API error: {0}")]
    Api(String),

    /// A source endpoint could not be turned into a query client.
    #[error("Engine: invalid source endpoint '{url}': {message}")]
    InvalidEndpoint { url: String, message: String },

    /// Ruleset serialization or archive failure during an update.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Convenience `Result` alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
