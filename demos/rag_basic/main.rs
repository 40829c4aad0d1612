//! # RAG Basic Example
//!
//! Builds an in-memory index over the built-in sample corpus and compares
//! plain similarity search with MMR for a few questions.
//!
//! Uses a deterministic bag-of-words `MockEmbeddingProvider`, so it runs with
//! **zero API keys**.
//!
//! Run: `cargo run --example rag_basic`

use std::sync::Arc;

use kestrel_rag::{
    EmbeddingProvider, IndexBuilder, RagConfig, Retriever, SearchMode, context, loader,
};

// ---------------------------------------------------------------------------
// MockEmbeddingProvider: hashes each word into one of `dimensions` buckets
// ---------------------------------------------------------------------------

struct MockEmbeddingProvider {
    dimensions: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> kestrel_rag::Result<Vec<f32>> {
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kestrel_telemetry::init_telemetry();

    // Small chunks so some documents split and MMR has near-duplicates to skip.
    let config = RagConfig::builder().chunk_size(120).chunk_overlap(30).build()?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider { dimensions: 256 });

    let corpus = loader::sample_corpus();
    let index = IndexBuilder::new(provider.clone(), config)?.build(&corpus).await?;
    println!("Indexed {} documents as {} chunks", corpus.len(), index.len());

    let retriever = Retriever::new(provider, index);
    let modes = [("similarity", SearchMode::similarity(3)), ("mmr", SearchMode::mmr(3, 10, 0.5))];

    for question in ["What is MMR?", "How does FAISS search vectors?", "What is a RAG pipeline?"] {
        println!("\nQuestion: \"{question}\"");
        for (label, mode) in &modes {
            let results = retriever.retrieve(question, mode).await?;
            println!("  {label}:");
            for (i, result) in results.iter().enumerate() {
                println!(
                    "    {}. [distance={:.4}] {} #{}",
                    i + 1,
                    result.distance,
                    result.chunk.source().unwrap_or("unknown"),
                    result.chunk.sequence,
                );
            }
        }
    }

    let results = retriever.retrieve("What is MMR?", &SearchMode::mmr(2, 10, 0.5)).await?;
    println!("\nPrompt context:\n{}", context::format_for_prompt(&results));
    Ok(())
}
