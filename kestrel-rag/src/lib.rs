//! # kestrel-rag
//!
//! Retrieval core for retrieval-augmented generation: recursive chunking, a
//! pluggable embedding provider, exact L2 vector search, and similarity or
//! Maximal Marginal Relevance ranking over a persisted index.
//!
//! ## Workflow
//!
//! ```text
//! Documents ──► RecursiveChunker ──► EmbeddingProvider ──► RetrievalIndex
//!                                                      (FlatL2Index + DocumentStore)
//!                                                               │
//!                            persist::save / persist::load ◄────┤
//!                                                               ▼
//!                     query ──► Retriever (similarity | MMR) ──► RetrievedChunk
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kestrel_rag::{IndexBuilder, RagConfig, Retriever, loader};
//!
//! let config = RagConfig::builder().mmr(3, 20, 0.5).build()?;
//! let builder = IndexBuilder::new(provider.clone(), config.clone())?;
//! let index = builder.load_or_build("./kestrel_index", &loader::sample_corpus()).await?;
//!
//! let retriever = Retriever::new(provider, index);
//! let results = retriever.retrieve_with("What is MMR?", &config).await?;
//! println!("{}", kestrel_rag::context::format_for_prompt(&results));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` (default) | [`openai::OpenAIEmbeddingProvider`] for OpenAI-compatible servers |

pub mod builder;
pub mod chunking;
pub mod config;
pub mod context;
pub mod docstore;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
pub mod mmr;
#[cfg(feature = "openai")]
pub mod openai;
pub mod persist;
pub mod retriever;

pub use builder::IndexBuilder;
pub use chunking::{DEFAULT_SEPARATORS, RecursiveChunker, TextSpan};
pub use config::{RagConfig, RagConfigBuilder, SearchMode};
pub use docstore::DocumentStore;
pub use document::{Chunk, ChunkId, Document, Metadata, MetadataValue, RetrievedChunk};
pub use embedding::{EmbeddingProvider, embed_batch_checked, embed_checked};
pub use error::{RagError, Result};
pub use index::{FlatL2Index, RetrievalIndex, l2_distance};
pub use persist::{Manifest, PersistedIndex};
pub use retriever::Retriever;
