//! Embedding provider trait for generating vector embeddings from text.

use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// Providers must report failures as [`RagError::EmbeddingError`] and never
/// substitute a placeholder vector.
///
/// # Example
///
/// ```rust,ignore
/// use kestrel_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short provider name used in logs and errors.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Embed one text under a deadline and validate the returned vector.
pub async fn embed_checked(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>> {
    let vector = match tokio::time::timeout(timeout, provider.embed(text)).await {
        Ok(result) => result?,
        Err(_) => {
            error!(provider = provider.name(), ?timeout, "embedding timed out");
            return Err(RagError::Timeout { operation: "embed".to_string(), timeout });
        }
    };
    validate_vector(provider, &vector)?;
    Ok(vector)
}

/// Embed a batch under a deadline and validate count, dimension, and values.
pub async fn embed_batch_checked(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
    timeout: Duration,
) -> Result<Vec<Vec<f32>>> {
    let vectors = match tokio::time::timeout(timeout, provider.embed_batch(texts)).await {
        Ok(result) => result?,
        Err(_) => {
            error!(
                provider = provider.name(),
                batch_size = texts.len(),
                ?timeout,
                "embedding timed out"
            );
            return Err(RagError::Timeout { operation: "embed_batch".to_string(), timeout });
        }
    };

    if vectors.len() != texts.len() {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
        });
    }
    for vector in &vectors {
        validate_vector(provider, vector)?;
    }
    Ok(vectors)
}

fn validate_vector(provider: &dyn EmbeddingProvider, vector: &[f32]) -> Result<()> {
    let expected = provider.dimensions();
    if vector.len() != expected {
        return Err(RagError::DimensionMismatch { expected, actual: vector.len() });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: "embedding contains non-finite values".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for Fixed {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct Stalled;

    #[async_trait]
    impl EmbeddingProvider for Stalled {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![0.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn default_batch_preserves_order_and_count() {
        let provider = Fixed(vec![1.0, 2.0]);
        let out = embed_batch_checked(&provider, &["a", "b", "c"], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let provider = Fixed(vec![1.0, 2.0, 3.0]);
        let err = embed_checked(&provider, "a", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[tokio::test]
    async fn rejects_non_finite_values() {
        let provider = Fixed(vec![f32::NAN, 0.0]);
        let err = embed_checked(&provider, "a", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_timeout() {
        let err = embed_checked(&Stalled, "a", Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, RagError::Timeout { .. }));
    }
}
