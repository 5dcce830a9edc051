use thiserror::Error;
use uitranslate::{CodecError, CollectionError};

/// Error types for the translation pipeline
#[derive(Debug, Error)]
pub enum MtError {
    /// Missing or rejected credentials, invalid configuration, HTTP 4xx
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Transport failure talking to a backend
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The backend answered but the answer was unusable
    #[error("Translation error: {0}")]
    TranslationError(String),
    /// Target language rejected before any backend call
    #[error("Invalid language: {0}")]
    InvalidLanguage(String),
    /// A translation run stopped between batches
    #[error("Translation cancelled after {completed_batches} batch(es)")]
    Cancelled { completed_batches: usize },
    /// Repository could not be scanned at all
    #[error("Scan error: {0}")]
    ScanError(String),
    /// A resource file could not be parsed or written
    #[error("Resource error in '{path}': {source}")]
    Resource {
        path: String,
        #[source]
        source: CodecError,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Collection(#[from] CollectionError),
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MtError::TranslationError(format!("Failed to decode response: {}", err))
        } else {
            MtError::NetworkError(err.to_string())
        }
    }
}

/// Result type for pipeline operations
pub type MtResult<T> = Result<T, MtError>;
