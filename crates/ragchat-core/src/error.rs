use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed input {}: {reason}", .path.display())]
    MalformedInput { path: PathBuf, reason: String },

    #[error("Unsupported vector index backend '{0}' (expected one of: flat, lance)")]
    UnsupportedBackend(String),

    #[error("Index at {} was built with backend '{found}' but '{expected}' is configured", .path.display())]
    BackendMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Index at {} was embedded with '{found}' but the active embedder is '{expected}'", .path.display())]
    EmbedderMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Refusing to load index at {}: set index.trust_persisted = true to trust persisted indexes", .0.display())]
    UntrustedIndex(PathBuf),

    #[error("No vector index is loaded; run ingestion first")]
    IndexNotReady,

    #[error("Language model call failed: {message}")]
    ModelCall { status: Option<u16>, message: String },

    #[error("Language model call timed out after {0:?}")]
    ModelTimeout(Duration),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Index storage failed: {0}")]
    Storage(String),

    #[error("Cache operation failed: {0}")]
    Cache(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        Error::Storage(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        Error::Embedding(err.to_string())
    }

    pub fn cache<E: std::fmt::Display>(err: E) -> Self {
        Error::Cache(err.to_string())
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, transport failures (no HTTP status), rate limiting and
    /// server-side errors are retryable; everything else needs an operator.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ModelTimeout(_) => true,
            Error::ModelCall { status: None, .. } => true,
            Error::ModelCall { status: Some(code), .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// True for failures of the language model collaborator.
    pub fn is_model_failure(&self) -> bool {
        matches!(self, Error::ModelCall { .. } | Error::ModelTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(Error::ModelTimeout(Duration::from_secs(1)).is_retryable());
        assert!(Error::ModelCall { status: None, message: "reset".into() }.is_retryable());
        assert!(Error::ModelCall { status: Some(503), message: "busy".into() }.is_retryable());
        assert!(Error::ModelCall { status: Some(429), message: "slow down".into() }.is_retryable());
        assert!(!Error::ModelCall { status: Some(401), message: "bad key".into() }.is_retryable());
        assert!(!Error::IndexNotReady.is_retryable());
    }
}
