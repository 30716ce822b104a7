//! Error types for the evaluation engine.

/// Errors that can occur while resolving configuration or running a batch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration store lookup failed (treated as a lookup error: the
    /// affected resource is marked NOT_EVALUATED and the run continues).
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem I/O error from the document loader.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error from the document loader.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Document validation error (e.g. duplicate rule IDs).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
