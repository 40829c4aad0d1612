//! On-disk persistence for a [`RetrievalIndex`].
//!
//! An index directory holds three files:
//!
//! - `vectors.bin`: the flat vector index (little-endian binary, see [`encode_vectors`])
//! - `docstore.json`: the document store export
//! - `manifest.json`: dimension, count, and SHA-256 checksums of both artifacts
//!
//! [`save`] writes all three into a fresh staging directory next to the
//! target and renames it into place, so a reader sees either the previous
//! complete index or the new one. [`load`] verifies checksums and cross-checks
//! the two stores before returning anything.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::docstore::DocumentStore;
use crate::document::{ChunkId, Document};
use crate::error::{RagError, Result};
use crate::index::{FlatL2Index, RetrievalIndex};

/// File name of the binary vector artifact.
pub const VECTORS_FILE: &str = "vectors.bin";
/// File name of the document store artifact.
pub const DOCSTORE_FILE: &str = "docstore.json";
/// File name of the manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

const MAGIC: &[u8; 8] = b"KSTRLVEC";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8 + 4 + 4 + 8;

/// Describes a persisted index and checksums its artifacts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// On-disk format version.
    pub format_version: u32,
    /// Vector dimensionality.
    pub dimension: usize,
    /// Number of chunks.
    pub count: usize,
    /// Hex SHA-256 of `vectors.bin`.
    pub vectors_sha256: String,
    /// Hex SHA-256 of `docstore.json`.
    pub docstore_sha256: String,
    /// Fingerprint of the corpus the index was built from, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_fingerprint: Option<String>,
    /// When the index was written.
    pub created_at: DateTime<Utc>,
}

/// A loaded index together with its manifest.
#[derive(Debug, Clone)]
pub struct PersistedIndex {
    /// The reconstructed index.
    pub index: RetrievalIndex,
    /// The manifest it was loaded with.
    pub manifest: Manifest,
}

/// SHA-256 over the texts and metadata of a corpus, in order.
///
/// Recorded in the manifest so callers can detect a changed corpus; nothing
/// in this crate enforces it.
pub fn corpus_fingerprint(documents: &[Document]) -> Result<String> {
    let bytes = serde_json::to_vec(documents)?;
    Ok(sha256_hex(&bytes))
}

/// Encode a vector index.
///
/// Layout: magic `KSTRLVEC`, `u32` version, `u32` dimension, `u64` count, then
/// for each entry a `u64` id followed by `dimension` `f32`s.
pub fn encode_vectors(index: &FlatL2Index) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + index.size() * (8 + 4 * index.dimension()));
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(index.dimension() as u32).to_le_bytes());
    bytes.extend_from_slice(&(index.size() as u64).to_le_bytes());
    for (id, vector) in index.iter() {
        bytes.extend_from_slice(&id.0.to_le_bytes());
        for value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

/// Decode [`encode_vectors`] output. Errors describe the first failed check.
pub fn decode_vectors(bytes: &[u8]) -> std::result::Result<FlatL2Index, String> {
    if bytes.len() < HEADER_LEN {
        return Err(format!("vector artifact is truncated ({} bytes)", bytes.len()));
    }
    if &bytes[..8] != MAGIC {
        return Err("vector artifact has the wrong magic header".to_string());
    }
    let version = read_u32(&bytes[8..12]);
    if version != FORMAT_VERSION {
        return Err(format!("unsupported vector format version {version}"));
    }
    let dimension = read_u32(&bytes[12..16]) as usize;
    let count = usize::try_from(read_u64(&bytes[16..24]))
        .map_err(|_| "vector count does not fit in memory".to_string())?;

    let record_len = 8 + 4 * dimension;
    let expected = count
        .checked_mul(record_len)
        .and_then(|body| body.checked_add(HEADER_LEN))
        .ok_or_else(|| "vector artifact size overflows".to_string())?;
    if bytes.len() != expected {
        return Err(format!(
            "vector artifact has {} bytes, expected {expected} for {count} vectors of \
             dimension {dimension}",
            bytes.len()
        ));
    }

    let mut index = FlatL2Index::new(dimension);
    let mut vector = Vec::with_capacity(dimension);
    for record in bytes[HEADER_LEN..].chunks_exact(record_len) {
        let id = ChunkId(read_u64(&record[..8]));
        vector.clear();
        vector.extend(
            record[8..].chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
        index.add(id, &vector).map_err(|e| e.to_string())?;
    }
    Ok(index)
}

/// Persist `index` to the directory `path`, replacing any previous index there.
///
/// # Errors
///
/// Returns [`RagError::Io`] if staging or the final rename fails; the
/// previous index, if any, is left in place.
pub fn save(
    index: &RetrievalIndex,
    path: impl AsRef<Path>,
    corpus_fingerprint: Option<String>,
) -> Result<Manifest> {
    let target = path.as_ref();
    let name = target
        .file_name()
        .ok_or_else(|| RagError::config(format!("{} does not name a directory", target.display())))?
        .to_string_lossy()
        .into_owned();
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let staging = parent.join(format!(".{name}.staging-{}", Uuid::new_v4()));
    fs::create_dir(&staging)?;
    let manifest = match write_artifacts(&staging, index, corpus_fingerprint) {
        Ok(manifest) => manifest,
        Err(e) => {
            remove_quietly(&staging);
            return Err(e);
        }
    };

    let backup = if target.exists() {
        let backup = parent.join(format!(".{name}.old-{}", Uuid::new_v4()));
        fs::rename(target, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(&staging, target) {
        if let Some(backup) = &backup {
            if let Err(restore) = fs::rename(backup, target) {
                warn!(
                    path = %target.display(),
                    error = %restore,
                    "failed to restore previous index"
                );
            }
        }
        remove_quietly(&staging);
        return Err(e.into());
    }
    if let Some(backup) = backup {
        remove_quietly(&backup);
    }
    if let Ok(dir) = File::open(&parent) {
        // Not supported on every platform.
        let _ = dir.sync_all();
    }

    info!(
        path = %target.display(),
        count = manifest.count,
        dimension = manifest.dimension,
        "persisted index"
    );
    Ok(manifest)
}

/// Load the index persisted at `path`.
///
/// # Errors
///
/// - [`RagError::NotFound`] if `path` does not exist or holds none of the
///   index artifacts
/// - [`RagError::CorruptIndex`] if only some artifacts are present, or one
///   fails its checksum or disagrees with the other artifact or the manifest
pub fn load(path: impl AsRef<Path>) -> Result<PersistedIndex> {
    let dir = path.as_ref();
    let artifacts = [MANIFEST_FILE, VECTORS_FILE, DOCSTORE_FILE];
    if !artifacts.iter().any(|name| dir.join(name).exists()) {
        return Err(RagError::NotFound { path: dir.to_path_buf() });
    }

    let manifest_bytes = read_artifact(dir, MANIFEST_FILE)?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| RagError::corrupt(dir, format!("unreadable manifest: {e}")))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(RagError::corrupt(
            dir,
            format!("unsupported format version {}", manifest.format_version),
        ));
    }

    let vector_bytes = read_artifact(dir, VECTORS_FILE)?;
    let docstore_bytes = read_artifact(dir, DOCSTORE_FILE)?;
    if sha256_hex(&vector_bytes) != manifest.vectors_sha256 {
        return Err(RagError::corrupt(dir, "vector artifact checksum mismatch"));
    }
    if sha256_hex(&docstore_bytes) != manifest.docstore_sha256 {
        return Err(RagError::corrupt(dir, "document store checksum mismatch"));
    }

    let vectors =
        decode_vectors(&vector_bytes).map_err(|message| RagError::corrupt(dir, message))?;
    if vectors.dimension() != manifest.dimension || vectors.size() != manifest.count {
        return Err(RagError::corrupt(
            dir,
            format!(
                "manifest records {} vectors of dimension {}, artifact holds {} of dimension {}",
                manifest.count,
                manifest.dimension,
                vectors.size(),
                vectors.dimension()
            ),
        ));
    }

    let docstore_json = std::str::from_utf8(&docstore_bytes)
        .map_err(|e| RagError::corrupt(dir, format!("document store is not UTF-8: {e}")))?;
    let documents = DocumentStore::import_json(docstore_json)
        .map_err(|e| RagError::corrupt(dir, format!("unreadable document store: {e}")))?;
    let index = RetrievalIndex::from_parts(vectors, documents)
        .map_err(|e| RagError::corrupt(dir, e.to_string()))?;

    info!(
        path = %dir.display(),
        count = index.len(),
        dimension = index.dimension(),
        "loaded index"
    );
    Ok(PersistedIndex { index, manifest })
}

fn write_artifacts(
    dir: &Path,
    index: &RetrievalIndex,
    corpus_fingerprint: Option<String>,
) -> Result<Manifest> {
    let vector_bytes = encode_vectors(index.vectors());
    let docstore_json = index.documents().export_json()?;

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        dimension: index.dimension(),
        count: index.len(),
        vectors_sha256: sha256_hex(&vector_bytes),
        docstore_sha256: sha256_hex(docstore_json.as_bytes()),
        corpus_fingerprint,
        created_at: Utc::now(),
    };

    write_synced(&dir.join(VECTORS_FILE), &vector_bytes)?;
    write_synced(&dir.join(DOCSTORE_FILE), docstore_json.as_bytes())?;
    write_synced(&dir.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;
    Ok(manifest)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn read_artifact(dir: &Path, name: &str) -> Result<Vec<u8>> {
    match fs::read(dir.join(name)) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(RagError::corrupt(dir, format!("{name} is missing")))
        }
        Err(e) => Err(e.into()),
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        warn!(path = %path.display(), error = %e, "failed to remove temporary index directory");
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_codec_round_trips() {
        let mut index = FlatL2Index::new(3);
        index.add(ChunkId(5), &[0.1, -2.5, f32::MIN_POSITIVE]).unwrap();
        index.add(ChunkId(1), &[1e-30, 3.0, -0.0]).unwrap();
        let decoded = decode_vectors(&encode_vectors(&index)).unwrap();
        assert_eq!(decoded, index);
    }

    #[test]
    fn decode_rejects_truncation_and_bad_magic() {
        let mut index = FlatL2Index::new(2);
        index.add(ChunkId(0), &[1.0, 2.0]).unwrap();
        let bytes = encode_vectors(&index);

        assert!(decode_vectors(&bytes[..bytes.len() - 1]).is_err());
        assert!(decode_vectors(&bytes[..10]).is_err());

        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(decode_vectors(&bad).is_err());
    }

    #[test]
    fn fingerprint_changes_with_corpus() {
        let a = vec![Document::new("one").with_source("a.md")];
        let b = vec![Document::new("two").with_source("a.md")];
        assert_eq!(corpus_fingerprint(&a).unwrap(), corpus_fingerprint(&a).unwrap());
        assert_ne!(corpus_fingerprint(&a).unwrap(), corpus_fingerprint(&b).unwrap());
    }
}
