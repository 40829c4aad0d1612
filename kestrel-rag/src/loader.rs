//! Document sources: markdown files split into sections, and a built-in
//! sample corpus for demos and tests.

use std::io::ErrorKind;
use std::path::Path;

use tracing::info;

use crate::document::{Document, MetadataValue};
use crate::error::{RagError, Result};

/// Section delimiter for markdown files.
pub const SECTION_DELIMITER: &str = "---";

/// Metadata key holding the 1-based section number.
pub const SECTION_KEY: &str = "section";

/// Read a markdown file and return one document per `---`-delimited section.
///
/// Each document carries `source` (the file name) and `section` (the
/// section's 1-based position in the file) metadata. Blank sections are
/// dropped but still count towards the numbering. Section text is kept
/// verbatim.
///
/// # Errors
///
/// Returns [`RagError::NotFound`] if the file does not exist and
/// [`RagError::Io`] if it cannot be read as UTF-8.
pub fn load_markdown_sections(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RagError::NotFound { path: path.to_path_buf() });
        }
        Err(e) => return Err(e.into()),
    };
    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let documents: Vec<Document> = content
        .split(SECTION_DELIMITER)
        .zip(1i64..)
        .filter(|(section, _)| !section.trim().is_empty())
        .map(|(section, number)| {
            Document::new(section)
                .with_source(source.as_str())
                .with_metadata(SECTION_KEY, MetadataValue::Integer(number))
        })
        .collect();

    info!(path = %path.display(), section_count = documents.len(), "loaded markdown sections");
    Ok(documents)
}

/// Load documents from `path` using the named format.
///
/// Only `"md"` is supported.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfiguration`] for an unknown format, otherwise
/// whatever the format's loader returns.
pub fn load_documents(format: &str, path: impl AsRef<Path>) -> Result<Vec<Document>> {
    match format {
        "md" => load_markdown_sections(path),
        other => Err(RagError::config(format!("unsupported document format '{other}'"))),
    }
}

const SAMPLE_CORPUS: [(&str, &str, &str); 5] = [
    (
        "doc1",
        "intro-langchain.md",
        "LangChain is a framework that helps developers build applications powered by Large \
         Language Models (LLMs). It provides chains, agents, prompt templates, memory, and \
         integrations with vector stores.",
    ),
    (
        "doc2",
        "faiss-overview.md",
        "FAISS is a library for efficient similarity search and clustering of dense vectors. \
         It supports exact and approximate nearest neighbor search and scales to millions of \
         vectors.",
    ),
    (
        "doc3",
        "embeddings-minilm.md",
        "Sentence-transformers like all-MiniLM-L6-v2 produce sentence embeddings suitable for \
         semantic search, clustering, and information retrieval. The embedding size is 384.",
    ),
    (
        "doc4",
        "rag-pipeline.md",
        "A typical RAG pipeline includes indexing (load, split, embed, store) and \
         retrieval+generation. Retrieval selects the most relevant chunks, and the LLM produces \
         an answer grounded in those chunks.",
    ),
    (
        "doc5",
        "retrieval-mmr.md",
        "Maximal Marginal Relevance (MMR) balances relevance and diversity during retrieval. \
         It helps avoid redundant chunks and improves coverage of different aspects.",
    ),
];

/// Five short documents about retrieval tooling, each with `id` and `source`
/// metadata.
pub fn sample_corpus() -> Vec<Document> {
    SAMPLE_CORPUS
        .iter()
        .map(|(id, source, text)| {
            Document::new(*text).with_metadata("id", *id).with_source(*source)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_sections_and_numbers_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# One\nfirst\n---\n\n---\n# Three\nthird\n").unwrap();

        let docs = load_markdown_sections(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "# One\nfirst\n");
        assert_eq!(docs[0].source(), Some("notes.md"));
        assert_eq!(docs[0].metadata[SECTION_KEY], MetadataValue::Integer(1));
        assert_eq!(docs[1].text, "\n# Three\nthird\n");
        assert_eq!(docs[1].metadata[SECTION_KEY], MetadataValue::Integer(3));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_markdown_sections(dir.path().join("absent.md")).unwrap_err();
        assert!(matches!(err, RagError::NotFound { .. }));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = load_documents("pdf", "whatever.pdf").unwrap_err();
        assert!(matches!(err, RagError::InvalidConfiguration(_)));
    }

    #[test]
    fn sample_corpus_has_five_sourced_documents() {
        let docs = sample_corpus();
        assert_eq!(docs.len(), 5);
        assert_eq!(docs[4].source(), Some("retrieval-mmr.md"));
        assert_eq!(docs[0].metadata["id"].as_str(), Some("doc1"));
        assert!(docs.iter().all(|d| d.text.chars().count() < 1000));
    }
}
