//! Exact nearest-neighbor search over L2 distance.
//!
//! [`FlatL2Index`] scans every stored vector on each query; there is no
//! approximation and no pruning. [`RetrievalIndex`] pairs it with a
//! [`DocumentStore`] and keeps the two id sets identical.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::docstore::DocumentStore;
use crate::document::{Chunk, ChunkId};
use crate::error::{RagError, Result};

/// Euclidean distance between two vectors of equal length.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// An append-only flat index of fixed-dimension vectors.
///
/// Vectors are stored contiguously in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    ids: Vec<ChunkId>,
    data: Vec<f32>,
    positions: HashMap<ChunkId, usize>,
}

impl FlatL2Index {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self { dimension, ids: Vec::new(), data: Vec::new(), positions: HashMap::new() }
    }

    /// Vector dimensionality.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn size(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Stored ids in insertion order.
    pub fn ids(&self) -> &[ChunkId] {
        &self.ids
    }

    /// Whether `id` has a vector.
    pub fn contains(&self, id: ChunkId) -> bool {
        self.positions.contains_key(&id)
    }

    /// The vector stored for `id`.
    pub fn vector(&self, id: ChunkId) -> Option<&[f32]> {
        self.positions.get(&id).map(|&pos| self.row(pos))
    }

    /// Iterate `(id, vector)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ChunkId, &[f32])> {
        self.ids.iter().enumerate().map(|(pos, id)| (*id, self.row(pos)))
    }

    fn row(&self, pos: usize) -> &[f32] {
        &self.data[pos * self.dimension..(pos + 1) * self.dimension]
    }

    /// Append a vector.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the vector has the wrong
    /// length and [`RagError::DuplicateChunk`] if `id` is already present.
    pub fn add(&mut self, id: ChunkId, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if self.positions.contains_key(&id) {
            return Err(RagError::DuplicateChunk(id));
        }
        self.positions.insert(id, self.ids.len());
        self.ids.push(id);
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Return up to `top_n` `(id, distance)` pairs, nearest first.
    ///
    /// Equal distances keep insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the query has the wrong length.
    pub fn search(&self, query: &[f32], top_n: usize) -> Result<Vec<(ChunkId, f32)>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if top_n == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(ChunkId, f32)> = (0..self.size())
            .map(|pos| (self.ids[pos], l2_distance(self.row(pos), query)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_n);
        Ok(scored)
    }
}

/// A vector index and document store sharing one id space.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalIndex {
    vectors: FlatL2Index,
    documents: DocumentStore,
}

impl RetrievalIndex {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self { vectors: FlatL2Index::new(dimension), documents: DocumentStore::new() }
    }

    /// Pair an existing vector index and document store.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] unless both hold exactly the
    /// same ids.
    pub fn from_parts(vectors: FlatL2Index, documents: DocumentStore) -> Result<Self> {
        if let Some(message) = integrity_violation(&vectors, &documents) {
            return Err(RagError::config(message));
        }
        Ok(Self { vectors, documents })
    }

    /// Add a chunk and its embedding to both stores.
    ///
    /// Nothing is inserted if either store rejects the entry.
    pub fn insert(&mut self, chunk: Chunk, vector: &[f32]) -> Result<()> {
        if self.documents.contains(chunk.id) {
            return Err(RagError::DuplicateChunk(chunk.id));
        }
        self.vectors.add(chunk.id, vector)?;
        self.documents.put(chunk)
    }

    /// The vector side of the index.
    pub fn vectors(&self) -> &FlatL2Index {
        &self.vectors
    }

    /// The document side of the index.
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Vector dimensionality.
    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.vectors.size()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Split back into the two stores.
    pub fn into_parts(self) -> (FlatL2Index, DocumentStore) {
        (self.vectors, self.documents)
    }
}

pub(crate) fn integrity_violation(
    vectors: &FlatL2Index,
    documents: &DocumentStore,
) -> Option<String> {
    if vectors.size() != documents.len() {
        return Some(format!(
            "vector index has {} entries but document store has {}",
            vectors.size(),
            documents.len()
        ));
    }
    vectors
        .ids()
        .iter()
        .find(|id| !documents.contains(**id))
        .map(|id| format!("chunk {id} has a vector but no document entry"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn chunk(id: u64) -> Chunk {
        Chunk {
            id: ChunkId(id),
            text: format!("chunk {id}"),
            metadata: Metadata::new(),
            sequence: 0,
            start: 0,
        }
    }

    #[test]
    fn search_orders_by_ascending_distance() {
        let mut index = FlatL2Index::new(2);
        index.add(ChunkId(0), &[5.0, 0.0]).unwrap();
        index.add(ChunkId(1), &[1.0, 0.0]).unwrap();
        index.add(ChunkId(2), &[0.0, 2.0]).unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let ids: Vec<u64> = hits.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert!((hits[2].1 - 5.0).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = FlatL2Index::new(1);
        for id in [3, 1, 2] {
            index.add(ChunkId(id), &[1.0]).unwrap();
        }
        let hits = index.search(&[0.0], 3).unwrap();
        let ids: Vec<u64> = hits.iter().map(|(id, _)| id.0).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn search_truncates_and_handles_empty() {
        let mut index = FlatL2Index::new(1);
        assert!(index.search(&[0.0], 5).unwrap().is_empty());
        index.add(ChunkId(0), &[1.0]).unwrap();
        index.add(ChunkId(1), &[2.0]).unwrap();
        assert_eq!(index.search(&[0.0], 1).unwrap().len(), 1);
        assert!(index.search(&[0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let mut index = FlatL2Index::new(3);
        assert!(matches!(
            index.add(ChunkId(0), &[1.0, 0.0]),
            Err(RagError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut index = FlatL2Index::new(1);
        index.add(ChunkId(4), &[1.0]).unwrap();
        assert!(matches!(index.add(ChunkId(4), &[2.0]), Err(RagError::DuplicateChunk(_))));
        assert_eq!(index.size(), 1);
    }

    #[test]
    fn retrieval_index_keeps_stores_in_sync() {
        let mut index = RetrievalIndex::new(2);
        index.insert(chunk(0), &[0.0, 1.0]).unwrap();
        // Wrong dimension: neither store may change.
        assert!(index.insert(chunk(1), &[0.0]).is_err());
        assert_eq!(index.len(), 1);
        assert_eq!(index.documents().len(), 1);
        assert!(!index.documents().contains(ChunkId(1)));
    }

    #[test]
    fn from_parts_checks_referential_integrity() {
        let mut vectors = FlatL2Index::new(1);
        vectors.add(ChunkId(0), &[1.0]).unwrap();
        let mut documents = DocumentStore::new();
        documents.put(chunk(9)).unwrap();
        assert!(RetrievalIndex::from_parts(vectors, documents).is_err());
    }
}
