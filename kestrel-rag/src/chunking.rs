//! Recursive, separator-aware document chunking.
//!
//! [`RecursiveChunker`] splits text on the highest-priority separator present,
//! recursing into pieces that are still too long, and falls back to single
//! characters when no separator is left. Pieces are then packed
//! greedily into chunks of at most `chunk_size` characters, each chunk
//! repeating up to `chunk_overlap` characters from the tail of the previous
//! one.
//!
//! Separators stay attached to the piece they terminate, so the pieces of a
//! text concatenate back to it exactly and every chunk is a contiguous slice
//! of the source document. Lengths are counted in `char`s.

use crate::config::{RagConfig, validate_chunking};
use crate::document::{Chunk, ChunkId, Document};
use crate::error::Result;

/// Separators tried in priority order. The trailing `""` means "hard cut".
pub const DEFAULT_SEPARATORS: &[&str] =
    &["\n\n", "\n", ". ", "? ", "! ", "; ", ": ", ", ", " ", ""];

/// A contiguous slice of a text produced by [`RecursiveChunker::split_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Character offset of the span in the source text.
    pub start: usize,
    /// The span's text.
    pub text: String,
}

/// Splits text hierarchically along [`DEFAULT_SEPARATORS`] with overlap.
///
/// # Example
///
/// ```rust
/// use kestrel_rag::{Document, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(40, 10).unwrap();
/// let chunks = chunker.split(&Document::new("First paragraph.\n\nSecond paragraph is here."));
/// assert_eq!(chunks.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`](crate::RagError::InvalidConfiguration)
    /// if `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    /// Create a chunker from the chunking fields of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replace the separator list. A hard cut still applies once the list is exhausted.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Configured overlap in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into ordered, possibly overlapping spans.
    pub fn split_text(&self, text: &str) -> Vec<TextSpan> {
        if text.is_empty() {
            return Vec::new();
        }

        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        let mut pieces = Vec::new();
        split_pieces(text, 0, &separators, self.chunk_size, &mut pieces);

        let ranges = self.merge(&pieces);
        let offsets = char_offsets(text);
        ranges
            .into_iter()
            .map(|(start, end)| TextSpan {
                start,
                text: text[offsets[start]..offsets[end]].to_string(),
            })
            .collect()
    }

    /// Split one document. Chunk ids start at zero.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.split_documents(std::slice::from_ref(document))
    }

    /// Split a corpus, numbering chunks monotonically across all documents.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            for (sequence, span) in self.split_text(&document.text).into_iter().enumerate() {
                chunks.push(Chunk {
                    id: ChunkId(chunks.len() as u64),
                    text: span.text,
                    metadata: document.metadata.clone(),
                    sequence,
                    start: span.start,
                });
            }
        }
        chunks
    }

    /// Pack pieces into `[start, end)` character ranges.
    fn merge(&self, pieces: &[Piece]) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut current: Option<(usize, usize)> = None;

        for piece in pieces {
            current = match current {
                None => Some((piece.start, piece.end)),
                Some((start, end)) if end - start + piece.len() <= self.chunk_size => {
                    Some((start, piece.end))
                }
                Some((start, end)) => {
                    ranges.push((start, end));
                    let carry = self
                        .chunk_overlap
                        .min(self.chunk_size - piece.len())
                        .min((end - start).saturating_sub(1));
                    Some((end - carry, piece.end))
                }
            };
        }

        if let Some(range) = current {
            ranges.push(range);
        }
        ranges
    }
}

/// A separator-delimited piece, as a `[start, end)` character range.
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
}

impl Piece {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Recursively cut `text` into pieces no longer than `chunk_size` characters.
///
/// `offset` is the character offset of `text` in the original document.
fn split_pieces(
    text: &str,
    offset: usize,
    separators: &[&str],
    chunk_size: usize,
    out: &mut Vec<Piece>,
) {
    let len = text.chars().count();
    if len <= chunk_size {
        out.push(Piece { start: offset, end: offset + len });
        return;
    }

    let found = separators.iter().position(|sep| sep.is_empty() || text.contains(sep));
    let Some(position) = found.filter(|&i| !separators[i].is_empty()) else {
        hard_cut(text, offset, out);
        return;
    };

    let remaining = &separators[position + 1..];
    let mut segment_offset = offset;
    for segment in split_keeping_separator(text, separators[position]) {
        split_pieces(segment, segment_offset, remaining, chunk_size, out);
        segment_offset += segment.chars().count();
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// One piece per character, so merging can still carry the full overlap.
fn hard_cut(text: &str, offset: usize, out: &mut Vec<Piece>) {
    let len = text.chars().count();
    out.extend((offset..offset + len).map(|start| Piece { start, end: start + 1 }));
}

/// Byte offset of every character boundary, including the end of the text.
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(chunker: &RecursiveChunker, text: &str) -> Vec<String> {
        chunker.split_text(text).into_iter().map(|s| s.text).collect()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = RecursiveChunker::new(10, 2).unwrap();
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split(&Document::new("")).is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = RecursiveChunker::new(100, 10).unwrap();
        assert_eq!(spans(&chunker, "hello world"), vec!["hello world"]);
    }

    #[test]
    fn rejects_overlap_not_below_size() {
        assert!(RecursiveChunker::new(10, 10).is_err());
        assert!(RecursiveChunker::new(0, 0).is_err());
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let chunker = RecursiveChunker::new(20, 0).unwrap();
        let text = "aaaa aaaa aaaa\n\nbbbb bbbb bbbb";
        assert_eq!(spans(&chunker, text), vec!["aaaa aaaa aaaa\n\n", "bbbb bbbb bbbb"]);
    }

    #[test]
    fn hard_cuts_separator_free_text() {
        let chunker = RecursiveChunker::new(4, 0).unwrap();
        assert_eq!(spans(&chunker, "abcdefghij"), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn carries_overlap_from_previous_chunk() {
        let chunker = RecursiveChunker::new(10, 3).unwrap();
        let result = chunker.split_text("one two three four");
        // Pieces: "one ", "two ", "three ", "four".
        assert_eq!(result[0].text, "one two ");
        assert_eq!(result[1].start, 5);
        assert_eq!(result[1].text, "wo three ");
        assert!(result.iter().all(|s| s.text.chars().count() <= 10));
    }

    #[test]
    fn overlap_shrinks_to_respect_chunk_size() {
        let chunker = RecursiveChunker::new(6, 4).unwrap();
        let result = chunker.split_text("abcdef ghijkl");
        assert!(result.iter().all(|s| s.text.chars().count() <= 6));
        assert_eq!(result.last().unwrap().text, "ghijkl");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunker = RecursiveChunker::new(3, 1).unwrap();
        let result = chunker.split_text("ééééé");
        assert!(result.iter().all(|s| s.text.chars().count() <= 3));
        assert_eq!(result[0].text, "ééé");
    }

    #[test]
    fn numbers_chunks_across_documents() {
        let chunker = RecursiveChunker::new(6, 0).unwrap();
        let docs = vec![
            Document::new("aaaaa bbbbb").with_source("a"),
            Document::new("ccccc").with_source("b"),
        ];
        let chunks = chunker.split_documents(&docs);
        let ids: Vec<u64> = chunks.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(chunks[1].sequence, 1);
        assert_eq!(chunks[2].sequence, 0);
        assert_eq!(chunks[2].source(), Some("b"));
    }

    #[test]
    fn custom_separators_fall_back_to_hard_cut() {
        let chunker = RecursiveChunker::new(4, 0).unwrap().with_separators(["|"]);
        assert_eq!(spans(&chunker, "ab|cdefgh"), vec!["ab|c", "defg", "h"]);
    }

    #[test]
    fn hard_cuts_keep_the_full_overlap() {
        let chunker = RecursiveChunker::new(10, 3).unwrap();
        let result = chunker.split_text("abcdefghijklmnopqrstuvwxyz");
        let starts: Vec<usize> = result.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 7, 14, 21]);
        assert_eq!(result[0].text, "abcdefghij");
        assert_eq!(result[1].text, "hijklmnopq");
        assert_eq!(result[3].text, "vwxyz");
    }

    #[test]
    fn long_cjk_runs_overlap() {
        let chunker = RecursiveChunker::new(1000, 100).unwrap();
        let text: String = std::iter::repeat_n('字', 2500).collect();
        let starts: Vec<usize> = chunker.split_text(&text).iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 900, 1800]);
    }
}
