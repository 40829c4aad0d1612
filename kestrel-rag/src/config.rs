//! Configuration for chunking, embedding, and retrieval.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// How the retriever ranks candidates.
///
/// Each variant carries only the parameters its policy needs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchMode {
    /// Return the `k` nearest chunks by L2 distance.
    Similarity {
        /// Number of results.
        k: usize,
    },
    /// Maximal Marginal Relevance over a pool of `fetch_k` nearest chunks.
    Mmr {
        /// Number of results.
        k: usize,
        /// Size of the candidate pool to diversify over.
        fetch_k: usize,
        /// 1.0 ranks purely by relevance, 0.0 purely by diversity.
        lambda: f32,
    },
}

impl SearchMode {
    /// Plain similarity search returning `k` results.
    pub fn similarity(k: usize) -> Self {
        Self::Similarity { k }
    }

    /// MMR search returning `k` results from a pool of `fetch_k`.
    pub fn mmr(k: usize, fetch_k: usize, lambda: f32) -> Self {
        Self::Mmr { k, fetch_k, lambda }
    }

    /// Number of results requested.
    pub fn k(&self) -> usize {
        match self {
            Self::Similarity { k } | Self::Mmr { k, .. } => *k,
        }
    }

    /// Check the mode's parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `k > fetch_k` or
    /// `lambda` is not a finite value in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if let Self::Mmr { k, fetch_k, lambda } = *self {
            if k > fetch_k {
                return Err(RagError::config(format!(
                    "fetch_k ({fetch_k}) must be greater than or equal to k ({k})"
                )));
            }
            if !(0.0..=1.0).contains(&lambda) {
                return Err(RagError::config(format!(
                    "mmr lambda ({lambda}) must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::Mmr { k: 1, fetch_k: 20, lambda: 1.0 }
    }
}

/// Configuration parameters for building and querying an index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Ranking policy used by [`Retriever::retrieve_with`](crate::Retriever::retrieve_with).
    pub search: SearchMode,
    /// Deadline for each embedding call.
    #[serde(with = "duration_millis", rename = "embedding_timeout_ms")]
    pub embedding_timeout: Duration,
    /// Number of chunk texts sent per `embed_batch` call during a build.
    pub embedding_batch_size: usize,
    /// Number of batches in flight at once during a build.
    pub embedding_concurrency: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            search: SearchMode::default(),
            embedding_timeout: Duration::from_secs(30),
            embedding_batch_size: 32,
            embedding_concurrency: 1,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Read a configuration from a JSON file and validate it.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - the search mode is invalid (see [`SearchMode::validate`])
    /// - `embedding_batch_size` or `embedding_concurrency` is zero
    /// - `embedding_timeout` is zero
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        self.search.validate()?;
        if self.embedding_batch_size == 0 {
            return Err(RagError::config("embedding_batch_size must be greater than zero"));
        }
        if self.embedding_concurrency == 0 {
            return Err(RagError::config("embedding_concurrency must be greater than zero"));
        }
        if self.embedding_timeout.is_zero() {
            return Err(RagError::config("embedding_timeout must be greater than zero"));
        }
        Ok(())
    }
}

pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::config("chunk_size must be greater than zero"));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::config(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the ranking policy.
    pub fn search(mut self, search: SearchMode) -> Self {
        self.config.search = search;
        self
    }

    /// Use similarity ranking with `k` results.
    pub fn similarity(self, k: usize) -> Self {
        self.search(SearchMode::similarity(k))
    }

    /// Use MMR ranking.
    pub fn mmr(self, k: usize, fetch_k: usize, lambda: f32) -> Self {
        self.search(SearchMode::mmr(k, fetch_k, lambda))
    }

    /// Set the deadline for each embedding call.
    pub fn embedding_timeout(mut self, timeout: Duration) -> Self {
        self.config.embedding_timeout = timeout;
        self
    }

    /// Set how many chunk texts go into one `embed_batch` call.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set how many embedding batches may be in flight at once.
    pub fn embedding_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embedding_concurrency = concurrency;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] for any rule listed on
    /// [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
