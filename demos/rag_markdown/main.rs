//! # RAG Markdown Example
//!
//! Loads a markdown file split on `---` into one document per section, then
//! answers questions with MMR and prints the best context per source.
//!
//! Pass a markdown file path as the first argument, or omit it to use a
//! bundled guide. Uses `MockEmbeddingProvider`, so **zero API keys**.
//!
//! Run: `cargo run --example rag_markdown -- [path/to/file.md]`

use std::path::PathBuf;
use std::sync::Arc;

use kestrel_rag::{EmbeddingProvider, IndexBuilder, RagConfig, Retriever, context, loader};

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
}

// ---------------------------------------------------------------------------
// Sample markdown document
// ---------------------------------------------------------------------------

const SAMPLE_MARKDOWN: &str = r#"# Kestrel Guide

Kestrel indexes documents for retrieval-augmented generation. Documents are
split into overlapping chunks, embedded, and stored in a flat L2 index.
---
## Chunking

The recursive chunker tries paragraph breaks first, then line breaks, then
sentence punctuation, then spaces. Text with no separator left is cut at the
chunk size. Every chunk remembers its character offset in the source.
---
## Persistence

An index directory holds vectors.bin, docstore.json, and manifest.json. The
manifest records SHA-256 checksums, so a damaged index is reported as corrupt
instead of being loaded.
---
## Ranking

Similarity search returns the nearest chunks by Euclidean distance. Maximal
Marginal Relevance trades relevance against redundancy with a lambda between
zero and one.
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kestrel_telemetry::init_telemetry();

    let path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let path = std::env::temp_dir().join("kestrel-guide.md");
            std::fs::write(&path, SAMPLE_MARKDOWN)?;
            path
        }
    };

    let documents = loader::load_documents("md", &path)?;
    println!("Loaded {} sections from {}", documents.len(), path.display());

    let config = RagConfig::builder().chunk_size(200).chunk_overlap(40).mmr(3, 8, 0.6).build()?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider { dimensions: 128 });
    let index = IndexBuilder::new(provider.clone(), config.clone())?.build(&documents).await?;
    let retriever = Retriever::new(provider, index);

    for question in ["How is a damaged index detected?", "What does lambda control?"] {
        let results = retriever.retrieve_with(question, &config).await?;
        println!("\nQuestion: \"{question}\"");
        for (source, text) in context::contexts_by_source(&results) {
            let preview: String = text.trim().chars().take(80).collect();
            println!("  [{source}] {preview}");
        }
        for result in &results {
            let section = result.chunk.metadata.get(loader::SECTION_KEY);
            println!(
                "    section {} distance {:.4}",
                section.map(ToString::to_string).unwrap_or_default(),
                result.distance
            );
        }
    }

    Ok(())
}
