//! Index construction and the load-or-build entry point.
//!
//! [`IndexBuilder`] runs the ingest workflow (chunk → embed → store) over a
//! whole corpus and produces a [`RetrievalIndex`]. Chunk texts are embedded in
//! batches of [`RagConfig::embedding_batch_size`], with up to
//! [`RagConfig::embedding_concurrency`] batches in flight. Results are
//! consumed in submission order, so every vector lands next to its chunk.
//!
//! # Example
//!
//! ```rust,ignore
//! use kestrel_rag::{IndexBuilder, RagConfig, loader};
//!
//! let builder = IndexBuilder::new(provider, RagConfig::default())?;
//! let index = builder.load_or_build("./kestrel_index", &loader::sample_corpus()).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, error, info, warn};

use crate::chunking::RecursiveChunker;
use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::embedding::{EmbeddingProvider, embed_batch_checked};
use crate::error::{RagError, Result};
use crate::index::RetrievalIndex;
use crate::persist;

/// Builds retrieval indexes from documents with one embedding provider.
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    chunker: RecursiveChunker,
    config: RagConfig,
}

impl IndexBuilder {
    /// Create a builder.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `config` is invalid or the
    /// provider reports zero dimensions.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: RagConfig) -> Result<Self> {
        config.validate()?;
        if provider.dimensions() == 0 {
            return Err(RagError::config(format!(
                "embedding provider '{}' reports zero dimensions",
                provider.name()
            )));
        }
        let chunker = RecursiveChunker::from_config(&config)?;
        Ok(Self { provider, chunker, config })
    }

    /// The configuration this builder was created with.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The embedding provider.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Chunk, embed, and index `documents`.
    ///
    /// An empty corpus yields an empty index without calling the provider.
    ///
    /// # Errors
    ///
    /// Any embedding failure aborts the build and is returned unchanged
    /// ([`RagError::EmbeddingError`], [`RagError::Timeout`], or
    /// [`RagError::DimensionMismatch`]).
    pub async fn build(&self, documents: &[Document]) -> Result<RetrievalIndex> {
        let chunks = self.chunker.split_documents(documents);
        let dimension = self.provider.dimensions();
        let mut index = RetrievalIndex::new(dimension);
        if chunks.is_empty() {
            info!(document_count = documents.len(), chunk_count = 0, "built index (empty)");
            return Ok(index);
        }

        let batches: Vec<Vec<Vec<f32>>> =
            stream::iter(chunks.chunks(self.config.embedding_batch_size))
                .map(|batch| self.embed_batch(batch))
                .buffered(self.config.embedding_concurrency)
                .try_collect()
                .await?;

        for (chunk, vector) in chunks.into_iter().zip(batches.into_iter().flatten()) {
            index.insert(chunk, &vector)?;
        }

        info!(
            document_count = documents.len(),
            chunk_count = index.len(),
            dimension,
            provider = self.provider.name(),
            "built index"
        );
        Ok(index)
    }

    /// Load the index persisted at `path`, or build and persist it.
    ///
    /// A missing directory, or one holding none of the index artifacts,
    /// triggers a build; a corrupt index is an error. A loaded index is not checked against `documents`; delete the
    /// directory to force a rebuild.
    ///
    /// # Errors
    ///
    /// - [`RagError::CorruptIndex`] if the persisted index fails its checks
    /// - [`RagError::DimensionMismatch`] if the loaded index does not match
    ///   the provider's dimensionality
    /// - any error from [`build`](Self::build) or [`persist::save`]
    pub async fn load_or_build(
        &self,
        path: impl AsRef<Path>,
        documents: &[Document],
    ) -> Result<RetrievalIndex> {
        let path = path.as_ref();
        match persist::load(path) {
            Ok(persisted) => {
                let expected = self.provider.dimensions();
                if persisted.index.dimension() != expected {
                    error!(
                        path = %path.display(),
                        expected,
                        actual = persisted.index.dimension(),
                        "persisted index does not match embedding provider"
                    );
                    return Err(RagError::DimensionMismatch {
                        expected,
                        actual: persisted.index.dimension(),
                    });
                }
                Ok(persisted.index)
            }
            Err(RagError::NotFound { .. }) => {
                warn!(path = %path.display(), "no persisted index found, building");
                let index = self.build(documents).await?;
                let fingerprint = persist::corpus_fingerprint(documents)?;
                persist::save(&index, path, Some(fingerprint))?;
                Ok(index)
            }
            Err(e) => Err(e),
        }
    }

    async fn embed_batch(&self, batch: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        debug!(first_chunk = %batch[0].id, batch_size = texts.len(), "embedding batch");
        embed_batch_checked(self.provider.as_ref(), &texts, self.config.embedding_timeout)
            .await
            .inspect_err(|e| {
                error!(first_chunk = %batch[0].id, error = %e, "embedding failed during build");
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds a text as `[char count, batch call number]`.
    struct Recording {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for Recording {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.chars().count() as f32, 0.0])
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as f32;
            Ok(texts.iter().map(|t| vec![t.chars().count() as f32, call]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn recording() -> Arc<Recording> {
        Arc::new(Recording { calls: AtomicUsize::new(0) })
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("a").with_source("one.md"),
            Document::new("bb").with_source("two.md"),
            Document::new("ccc").with_source("three.md"),
        ]
    }

    #[tokio::test]
    async fn vectors_stay_paired_with_chunks_across_batches() {
        let provider = recording();
        let config =
            RagConfig::builder().embedding_batch_size(2).embedding_concurrency(2).build().unwrap();
        let builder = IndexBuilder::new(provider.clone(), config).unwrap();

        let index = builder.build(&corpus()).await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        for chunk in index.documents().iter() {
            let vector = index.vectors().vector(chunk.id).unwrap();
            assert_eq!(vector[0], chunk.char_len() as f32);
        }
    }

    #[tokio::test]
    async fn empty_corpus_skips_the_provider() {
        let provider = recording();
        let builder = IndexBuilder::new(provider.clone(), RagConfig::default()).unwrap();
        let index = builder.build(&[]).await.unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = RagConfig { chunk_overlap: 5000, ..RagConfig::default() };
        assert!(matches!(
            IndexBuilder::new(recording(), config),
            Err(RagError::InvalidConfiguration(_))
        ));
    }
}
