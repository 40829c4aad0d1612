//! Query-time retrieval over a [`RetrievalIndex`].
//!
//! [`Retriever::retrieve`] is the single query surface:
//! validate → embed → candidate search → rank (similarity or MMR).
//!
//! # Example
//!
//! ```rust,ignore
//! use kestrel_rag::{Retriever, SearchMode};
//!
//! let retriever = Retriever::new(provider, index);
//! let results = retriever.retrieve("What is MMR?", &SearchMode::mmr(3, 20, 0.5)).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::{RagConfig, SearchMode};
use crate::document::{ChunkId, RetrievedChunk};
use crate::embedding::{EmbeddingProvider, embed_checked};
use crate::error::{RagError, Result};
use crate::index::RetrievalIndex;
use crate::mmr::{MmrCandidate, mmr_select};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Ranks indexed chunks against a query.
///
/// The index is read-only for the retriever's lifetime, so one retriever can
/// serve any number of queries.
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    index: RetrievalIndex,
    timeout: Duration,
}

impl Retriever {
    /// Create a retriever over a built or loaded index.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index: RetrievalIndex) -> Self {
        Self { provider, index, timeout: DEFAULT_TIMEOUT }
    }

    /// Set the deadline for query embedding.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The underlying index.
    pub fn index(&self) -> &RetrievalIndex {
        &self.index
    }

    /// Retrieve with the search mode and timeout from `config`.
    pub async fn retrieve_with(
        &self,
        query: &str,
        config: &RagConfig,
    ) -> Result<Vec<RetrievedChunk>> {
        self.rank(query, &config.search, config.embedding_timeout).await
    }

    /// Retrieve the chunks most relevant to `query` under `mode`.
    ///
    /// Parameters are validated before the provider is called.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidConfiguration`] if `mode` is invalid (e.g. `k > fetch_k`)
    /// - [`RagError::InvalidQuery`] if `query` is empty or whitespace
    /// - [`RagError::EmbeddingError`] / [`RagError::Timeout`] from the provider
    /// - [`RagError::DimensionMismatch`] if the query embedding does not match the index
    pub async fn retrieve(&self, query: &str, mode: &SearchMode) -> Result<Vec<RetrievedChunk>> {
        self.rank(query, mode, self.timeout).await
    }

    async fn rank(
        &self,
        query: &str,
        mode: &SearchMode,
        timeout: Duration,
    ) -> Result<Vec<RetrievedChunk>> {
        let index = &self.index;
        mode.validate()?;
        if query.trim().is_empty() {
            return Err(RagError::InvalidQuery("query text must not be empty".to_string()));
        }
        if index.is_empty() || mode.k() == 0 {
            debug!(index_size = index.len(), k = mode.k(), "nothing to retrieve");
            return Ok(Vec::new());
        }

        let query_embedding = embed_checked(self.provider.as_ref(), query, timeout)
            .await
            .inspect_err(|e| error!(error = %e, "embedding failed during query"))?;
        if query_embedding.len() != index.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: index.dimension(),
                actual: query_embedding.len(),
            });
        }

        let hits = match *mode {
            SearchMode::Similarity { k } => index.vectors().search(&query_embedding, k)?,
            SearchMode::Mmr { k, fetch_k, lambda } => {
                let pool = index.vectors().search(&query_embedding, fetch_k)?;
                let candidates = pool
                    .iter()
                    .map(|&(id, distance)| {
                        let vector = index.vectors().vector(id).ok_or_else(|| missing(id))?;
                        Ok(MmrCandidate { id, distance, vector })
                    })
                    .collect::<Result<Vec<_>>>()?;
                mmr_select(&candidates, k, lambda).into_iter().map(|i| pool[i]).collect()
            }
        };

        let results = hits
            .into_iter()
            .map(|(id, distance)| {
                let chunk = index.documents().get(id).ok_or_else(|| missing(id))?;
                Ok(RetrievedChunk { chunk: chunk.clone(), distance })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(result_count = results.len(), mode = mode_name(mode), "query completed");
        Ok(results)
    }
}

fn missing(id: ChunkId) -> RagError {
    error!(%id, "search hit without a stored entry");
    RagError::corrupt_in_memory(format!("chunk {id} is missing from the index"))
}

fn mode_name(mode: &SearchMode) -> &'static str {
    match mode {
        SearchMode::Similarity { .. } => "similarity",
        SearchMode::Mmr { .. } => "mmr",
    }
}
