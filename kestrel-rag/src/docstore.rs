//! Chunk text and metadata keyed by [`ChunkId`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, ChunkId};
use crate::error::{RagError, Result};

/// Holds every chunk of an index so search hits can be resolved to text.
///
/// Entries are kept in id order, which makes exports deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStore {
    entries: BTreeMap<ChunkId, Chunk>,
}

#[derive(Serialize)]
struct ExportRef<'a> {
    chunks: Vec<&'a Chunk>,
}

#[derive(Deserialize)]
struct Export {
    chunks: Vec<Chunk>,
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a chunk under its id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DuplicateChunk`] if the id is already present.
    pub fn put(&mut self, chunk: Chunk) -> Result<()> {
        if self.entries.contains_key(&chunk.id) {
            return Err(RagError::DuplicateChunk(chunk.id));
        }
        self.entries.insert(chunk.id, chunk);
        Ok(())
    }

    /// Look up a chunk by id.
    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        self.entries.get(&id)
    }

    /// Whether a chunk with this id is stored.
    pub fn contains(&self, id: ChunkId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over stored chunks in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.values()
    }

    /// Serialize every entry to JSON.
    pub fn export_json(&self) -> Result<String> {
        let export = ExportRef { chunks: self.entries.values().collect() };
        Ok(serde_json::to_string(&export)?)
    }

    /// Rebuild a store from [`export_json`](Self::export_json) output.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Serialization`] on malformed input and
    /// [`RagError::DuplicateChunk`] if an id appears twice.
    pub fn import_json(json: &str) -> Result<Self> {
        let export: Export = serde_json::from_str(json)?;
        let mut store = Self::new();
        for chunk in export.chunks {
            store.put(chunk)?;
        }
        Ok(store)
    }
}
