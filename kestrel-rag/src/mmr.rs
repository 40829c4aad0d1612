//! Maximal Marginal Relevance (MMR) selection.
//!
//! MMR picks results one at a time, balancing relevance to the query against
//! similarity to what has already been picked:
//!
//! `score(c) = λ × relevance(c) − (1 − λ) × max(similarity(c, s) for s in selected)`
//!
//! - λ = 1.0: pure relevance (same order as plain similarity search)
//! - λ = 0.0: pure diversity after the first pick
//!
//! Relevance and similarity both derive from L2 distance as `1 / (1 + d)`,
//! so they share the `(0, 1]` scale.

use tracing::debug;

use crate::document::ChunkId;
use crate::index::l2_distance;

/// A search hit eligible for MMR selection.
#[derive(Debug, Clone, Copy)]
pub struct MmrCandidate<'a> {
    /// Chunk identifier.
    pub id: ChunkId,
    /// Distance to the query.
    pub distance: f32,
    /// The chunk's embedding.
    pub vector: &'a [f32],
}

/// Map an L2 distance onto a `(0, 1]` similarity.
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Select up to `k` candidates by MMR and return their positions in `pool`.
///
/// `pool` must be ordered by ascending query distance; the first pick is
/// always `pool[0]`, and ties are broken by pool position. Each remaining
/// candidate's maximum similarity to the selected set is updated after every
/// pick instead of being recomputed.
pub fn mmr_select(pool: &[MmrCandidate<'_>], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(pool.len());
    if k == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = pool.iter().map(|c| distance_to_similarity(c.distance)).collect();
    let mut max_similarity = vec![f32::NEG_INFINITY; pool.len()];
    let mut selected = vec![false; pool.len()];
    let mut order = Vec::with_capacity(k);
    let mut pick = 0;

    loop {
        selected[pick] = true;
        order.push(pick);
        if order.len() == k {
            break;
        }

        let picked = pool[pick].vector;
        for (i, candidate) in pool.iter().enumerate() {
            if !selected[i] {
                let similarity = distance_to_similarity(l2_distance(candidate.vector, picked));
                max_similarity[i] = max_similarity[i].max(similarity);
            }
        }

        let mut best: Option<(usize, f32)> = None;
        for i in (0..pool.len()).filter(|&i| !selected[i]) {
            let score = lambda * relevance[i] - (1.0 - lambda) * max_similarity[i];
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        match best {
            Some((i, score)) => {
                debug!(id = %pool[i].id, position = i, score, "mmr pick");
                pick = i;
            }
            None => break,
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool<'a>(query: &[f32], vectors: &'a [Vec<f32>]) -> Vec<MmrCandidate<'a>> {
        let mut pool: Vec<MmrCandidate<'a>> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| MmrCandidate {
                id: ChunkId(i as u64),
                distance: l2_distance(v, query),
                vector: v,
            })
            .collect();
        pool.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        pool
    }

    fn ids(pool: &[MmrCandidate<'_>], picks: &[usize]) -> Vec<u64> {
        picks.iter().map(|&i| pool[i].id.0).collect()
    }

    #[test]
    fn empty_pool_or_zero_k() {
        assert!(mmr_select(&[], 3, 0.5).is_empty());
        let vectors = vec![vec![1.0, 0.0]];
        let p = pool(&[0.0, 0.0], &vectors);
        assert!(mmr_select(&p, 0, 0.5).is_empty());
    }

    #[test]
    fn returns_at_most_pool_size() {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let p = pool(&[0.0, 0.0], &vectors);
        assert_eq!(mmr_select(&p, 10, 0.5).len(), 2);
    }

    #[test]
    fn lambda_one_preserves_relevance_order() {
        let vectors = vec![vec![0.9, 0.1], vec![0.88, 0.12], vec![0.5, 0.5], vec![0.0, 1.0]];
        let p = pool(&[1.0, 0.0], &vectors);
        let picks = mmr_select(&p, 4, 1.0);
        assert_eq!(picks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn promotes_diverse_result_over_near_duplicate() {
        let vectors = vec![vec![0.99, 0.01, 0.0], vec![0.98, 0.02, 0.0], vec![0.0, 0.0, 1.0]];
        let p = pool(&[1.0, 0.0, 0.0], &vectors);
        let picks = mmr_select(&p, 2, 0.5);
        assert_eq!(ids(&p, &picks), vec![0, 2]);
    }

    #[test]
    fn lambda_zero_spreads_out_after_first_pick() {
        let vectors = vec![vec![1.0, 0.0], vec![0.99, 0.01], vec![0.0, 1.0]];
        let p = pool(&[1.0, 0.0], &vectors);
        let picks = mmr_select(&p, 2, 0.0);
        assert_eq!(ids(&p, &picks), vec![0, 2]);
    }

    #[test]
    fn identical_vectors_fall_back_to_pool_order() {
        let vectors = vec![vec![1.0, 0.0]; 3];
        let p = pool(&[1.0, 0.0], &vectors);
        assert_eq!(mmr_select(&p, 3, 0.5), vec![0, 1, 2]);
    }
}
