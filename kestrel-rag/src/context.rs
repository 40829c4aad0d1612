//! Turning retrieval results into prompt context.

use std::collections::HashSet;

use crate::document::RetrievedChunk;

fn source_label(result: &RetrievedChunk, rank: usize) -> String {
    match result.chunk.source() {
        Some(source) => source.to_string(),
        None => format!("doc{rank}"),
    }
}

/// Render results as `[source:<source>] <text>` entries separated by blank
/// lines, in rank order.
///
/// A result without a `source` is labelled `doc<n>`, where `n` is its
/// 1-based rank.
pub fn format_for_prompt(results: &[RetrievedChunk]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!("[source:{}] {}", source_label(result, i + 1), result.chunk.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One `(source, text)` pair per distinct source, in rank order.
///
/// This deliberately differs from collecting into a map keyed by source:
/// when several results share a source, the best-ranked one is kept and
/// later ones never overwrite it. Results without a `source` are keyed
/// `doc<n>` by 1-based rank, the same labels [`format_for_prompt`] prints,
/// rather than by chunk id.
pub fn contexts_by_source(results: &[RetrievedChunk]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    results
        .iter()
        .enumerate()
        .map(|(i, result)| (source_label(result, i + 1), result))
        .filter(|(source, _)| seen.insert(source.clone()))
        .map(|(source, result)| (source, result.chunk.text.clone()))
        .collect()
}
