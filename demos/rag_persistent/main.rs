//! # RAG Persistent Example
//!
//! Builds the sample-corpus index once, persists it, and reloads it on later
//! runs without calling the embedding provider again. Delete the index
//! directory to force a rebuild.
//!
//! Uses an OpenAI-compatible server when `OPENAI_API_KEY` is set (point
//! `OPENAI_BASE_URL` at LM Studio or similar, and set
//! `OPENAI_EMBEDDING_DIMENSIONS` to the model's output size); otherwise falls
//! back to a deterministic `MockEmbeddingProvider`. Set `KESTREL_CONFIG` to a
//! JSON file to override the default `RagConfig`.
//!
//! Run: `cargo run --example rag_persistent -- [index_dir] [question]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use kestrel_rag::openai::OpenAIEmbeddingProvider;
use kestrel_rag::{EmbeddingProvider, IndexBuilder, RagConfig, Retriever, context, loader};
use tracing::info;

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
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn provider() -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    if std::env::var("OPENAI_API_KEY").is_err() {
        return Ok(Arc::new(MockEmbeddingProvider { dimensions: 256 }));
    }
    let mut provider = OpenAIEmbeddingProvider::from_env()?;
    if let Ok(dims) = std::env::var("OPENAI_EMBEDDING_DIMENSIONS") {
        provider = provider.with_expected_dimensions(dims.parse()?);
    }
    Ok(Arc::new(provider))
}

fn config() -> anyhow::Result<RagConfig> {
    Ok(match std::env::var("KESTREL_CONFIG") {
        Ok(path) => RagConfig::from_json_file(path)?,
        Err(_) => RagConfig::builder().mmr(2, 20, 0.7).build()?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kestrel_telemetry::init_telemetry();

    let mut args = std::env::args().skip(1);
    let index_dir = PathBuf::from(args.next().unwrap_or_else(|| "./kestrel_index".into()));
    let question = args.next().unwrap_or_else(|| "What is MMR?".into());

    let config = config()?;
    let provider = provider()?;
    info!(provider = provider.name(), dimensions = provider.dimensions(), "using embeddings");

    let started = Instant::now();
    let builder = IndexBuilder::new(provider.clone(), config.clone())?;
    let index = builder.load_or_build(&index_dir, &loader::sample_corpus()).await?;
    println!(
        "Index ready at {} ({} chunks, {:?})",
        index_dir.display(),
        index.len(),
        started.elapsed()
    );

    let retriever = Retriever::new(provider, index).with_timeout(config.embedding_timeout);
    let results = retriever.retrieve_with(&question, &config).await?;

    println!("\nQuestion: \"{question}\"\n");
    println!("{}", context::format_for_prompt(&results));
    Ok(())
}
