//! Error types for the `kestrel-rag` crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::document::ChunkId;

/// Errors that can occur while building, persisting, or querying an index.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Two components disagree on the embedding dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality the index or provider was built with.
        expected: usize,
        /// The dimensionality that was actually observed.
        actual: usize,
    },

    /// The query text cannot be searched for.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An external call did not complete within its deadline.
    #[error("Timeout: {operation} did not complete within {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// No persisted index exists at the given location.
    #[error("No persisted index at {}", path.display())]
    NotFound {
        /// The directory that was probed.
        path: PathBuf,
    },

    /// The persisted artifacts are unreadable or inconsistent with each other.
    #[error("Corrupt {}: {message}", location(path))]
    CorruptIndex {
        /// The index directory, or an empty path for an in-memory index.
        path: PathBuf,
        /// What check failed.
        message: String,
    },

    /// A chunk identifier was inserted twice.
    #[error("Duplicate chunk id {0}")]
    DuplicateChunk(ChunkId),

    /// A file system operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptIndex { path: path.into(), message: message.into() }
    }

    pub(crate) fn corrupt_in_memory(message: impl Into<String>) -> Self {
        Self::corrupt(PathBuf::new(), message)
    }
}

fn location(path: &Path) -> String {
    if path.as_os_str().is_empty() {
        "in-memory index".to_string()
    } else {
        format!("index at {}", path.display())
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_messages_name_their_location() {
        let on_disk = RagError::corrupt("/tmp/index", "manifest.json is missing");
        assert_eq!(on_disk.to_string(), "Corrupt index at /tmp/index: manifest.json is missing");

        let in_memory = RagError::corrupt_in_memory("chunk 3 is missing from the index");
        assert_eq!(
            in_memory.to_string(),
            "Corrupt in-memory index: chunk 3 is missing from the index"
        );
    }
}
