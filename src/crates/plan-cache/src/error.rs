//! Error types for plan cache operations

use plan_codec::CodecError;
use thiserror::Error;

/// Result type for plan cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while storing or loading cached plans
#[derive(Error, Debug)]
pub enum CacheError {
    /// Entry was written by an incompatible format or payload codec version
    #[error("Stale cache entry: {0}")]
    StaleEntry(String),

    /// Key cannot be used by the storage backend
    #[error("Invalid plan key: {0}")]
    InvalidKey(String),

    /// Plan construction failed on a cache miss
    #[error("Plan build failed: {0}")]
    Build(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Work graph section could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Entry header could not be encoded or decoded
    #[error("Binary serialization error: {0}")]
    Wire(#[from] bincode::Error),

    /// Entry metadata could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Wrap a failure reported by a plan builder
    pub fn build(message: impl Into<String>) -> Self {
        CacheError::Build(message.into())
    }

    /// True when the entry was rejected only because of its version header
    pub fn is_stale(&self) -> bool {
        matches!(self, CacheError::StaleEntry(_))
    }
}
