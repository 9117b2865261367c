//! Persistent flat vector index using cosine similarity.
//!
//! A [`VectorIndex`] is immutable once built. It is written to a directory
//! holding two files:
//!
//! - `index.json`: the [`IndexManifest`] (model, dimensions, counts)
//! - `chunks.bin`: chunk texts and embeddings, bincode-encoded
//!
//! Saving stages both files in a sibling directory and renames it into
//! place, so an interrupted save never leaves a half-written index behind.
//! A path occupied by anything other than an index is never overwritten.

use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};

/// Version of the on-disk layout written by [`VectorIndex::save`].
pub const INDEX_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "index.json";
const CHUNKS_FILE: &str = "chunks.bin";
const METRIC: &str = "cosine";

/// Metadata stored next to the chunk records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// On-disk layout version.
    pub format_version: u32,
    /// Unique per build; changes whenever the index is rebuilt.
    pub build_id: Uuid,
    /// Embedding model the vectors were produced with.
    pub model_id: String,
    /// Dimensionality of every stored vector.
    pub dimensions: usize,
    /// Similarity metric used by [`VectorIndex::search`].
    pub metric: String,
    /// Number of stored chunks.
    pub chunk_count: usize,
    /// Build time.
    pub created_at: DateTime<Utc>,
}

/// An exact nearest-neighbour index over chunk embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    manifest: IndexManifest,
    chunks: Vec<Chunk>,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Sort key that places NaN scores after every real score.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() { f32::NEG_INFINITY } else { score }
}

impl VectorIndex {
    /// Build an index from chunks and their embeddings.
    ///
    /// `vectors[i]` becomes the embedding of `chunks[i]`; any embedding
    /// already present on a chunk is replaced. An empty input produces a
    /// valid, empty index.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidParameter`] if the lengths differ or `dimensions` is zero
    /// - [`RagError::DimensionMismatch`] if a vector does not have `dimensions` entries
    pub fn build(
        mut chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        model_id: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::InvalidParameter(format!(
                "got {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if dimensions == 0 {
            return Err(RagError::InvalidParameter(
                "index dimensions must be greater than zero".to_string(),
            ));
        }

        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            if vector.len() != dimensions {
                return Err(RagError::DimensionMismatch {
                    expected: dimensions,
                    actual: vector.len(),
                });
            }
            chunk.embedding = vector;
        }

        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            build_id: Uuid::new_v4(),
            model_id: model_id.into(),
            dimensions,
            metric: METRIC.to_string(),
            chunk_count: chunks.len(),
            created_at: Utc::now(),
        };
        Ok(Self { manifest, chunks })
    }

    /// Search for the `k` chunks most similar to `query`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores keep
    /// insertion order. A `k` larger than the index returns every chunk.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `query` has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.manifest.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.manifest.dimensions,
                actual: query.len(),
            });
        }
        if k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, cosine_similarity(&chunk.embedding, query)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| {
            rank_key(b.1).partial_cmp(&rank_key(a.1)).unwrap_or(Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: self.chunks[i].clone(), score })
            .collect())
    }

    /// Write the index to `path`, replacing a previous index stored there.
    ///
    /// `path` must be missing, an empty directory, or a directory holding an
    /// index (a corrupt one included). Anything else is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidParameter`] for a path without a final
    /// component or one occupied by something other than an index, and
    /// [`RagError::Io`] if writing fails.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let staging = staging_path(path, &self.manifest.build_id)?;
        let replace = check_replaceable(path).await?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        if let Err(e) = self.write_files(&staging).await {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                warn!(path = %staging.display(), error = %cleanup, "failed to remove staging directory");
            }
            return Err(e);
        }

        if replace {
            tokio::fs::remove_dir_all(path).await?;
        }
        tokio::fs::rename(&staging, path).await?;

        info!(
            path = %path.display(),
            chunk_count = self.chunks.len(),
            model = %self.manifest.model_id,
            "saved index"
        );
        Ok(())
    }

    async fn write_files(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;

        let manifest_json =
            serde_json::to_string_pretty(&self.manifest).map_err(std::io::Error::other)?;
        tokio::fs::write(dir.join(MANIFEST_FILE), manifest_json).await?;

        let records = bincode::serialize(&self.chunks).map_err(std::io::Error::other)?;
        tokio::fs::write(dir.join(CHUNKS_FILE), records).await?;
        Ok(())
    }

    /// Load an index previously written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotFound`] if `path` holds no index
    /// - [`RagError::IndexCorrupt`] if the files cannot be decoded or disagree
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let manifest = read_manifest(path).await?;

        let records = tokio::fs::read(path.join(CHUNKS_FILE)).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                corrupt(path, format!("missing {CHUNKS_FILE}"))
            } else {
                RagError::Io(e)
            }
        })?;
        let chunks: Vec<Chunk> = bincode::deserialize(&records)
            .map_err(|e| corrupt(path, format!("failed to decode {CHUNKS_FILE}: {e}")))?;

        if chunks.len() != manifest.chunk_count {
            return Err(corrupt(
                path,
                format!(
                    "manifest lists {} chunks, {CHUNKS_FILE} holds {}",
                    manifest.chunk_count,
                    chunks.len()
                ),
            ));
        }
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != manifest.dimensions) {
            return Err(corrupt(
                path,
                format!(
                    "chunk '{}' has {} dimensions, expected {}",
                    bad.id,
                    bad.embedding.len(),
                    manifest.dimensions
                ),
            ));
        }

        debug!(path = %path.display(), chunk_count = chunks.len(), "loaded index");
        Ok(Self { manifest, chunks })
    }

    /// The manifest describing this index.
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// The stored chunks in insertion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The embedding model the index was built with.
    pub fn model_id(&self) -> &str {
        &self.manifest.model_id
    }

    /// Dimensionality of the stored vectors.
    pub fn dimensions(&self) -> usize {
        self.manifest.dimensions
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Read only the manifest of the index at `path`.
///
/// # Errors
///
/// - [`RagError::IndexNotFound`] if `path` holds no index
/// - [`RagError::IndexCorrupt`] if the manifest cannot be decoded or has an
///   unsupported format version
pub async fn read_manifest(path: impl AsRef<Path>) -> Result<IndexManifest> {
    let path = path.as_ref();
    let json = match tokio::fs::read_to_string(path.join(MANIFEST_FILE)).await {
        Ok(json) => json,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Err(RagError::IndexNotFound { path: path.to_path_buf() });
        }
        Err(e) => return Err(RagError::Io(e)),
    };

    let manifest: IndexManifest = serde_json::from_str(&json)
        .map_err(|e| corrupt(path, format!("failed to parse {MANIFEST_FILE}: {e}")))?;
    if manifest.format_version != INDEX_FORMAT_VERSION {
        return Err(corrupt(
            path,
            format!("unsupported format version {}", manifest.format_version),
        ));
    }
    if manifest.metric != METRIC {
        return Err(corrupt(path, format!("unsupported metric '{}'", manifest.metric)));
    }
    Ok(manifest)
}

/// Whether `path` holds something `save` may replace; `false` when it is missing.
async fn check_replaceable(path: &Path) -> Result<bool> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if meta.is_dir() && tokio::fs::read_dir(path).await?.next_entry().await?.is_none() {
        return Ok(true);
    }
    match read_manifest(path).await {
        Ok(_) | Err(RagError::IndexCorrupt { .. }) => Ok(true),
        Err(RagError::IndexNotFound { .. }) => Err(RagError::InvalidParameter(format!(
            "'{}' exists and is not an index; refusing to replace it",
            path.display()
        ))),
        Err(e) => Err(e),
    }
}

fn corrupt(path: &Path, message: String) -> RagError {
    RagError::IndexCorrupt { path: path.to_path_buf(), message }
}

fn staging_path(path: &Path, build_id: &Uuid) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        RagError::InvalidParameter(format!("index path '{}' has no final component", path.display()))
    })?;
    let mut staged = name.to_os_string();
    staged.push(format!(".staging-{build_id}"));
    Ok(path.with_file_name(staged))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_orthogonal_and_zero_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn nan_ranks_below_negative_scores() {
        assert!(rank_key(f32::NAN) < rank_key(-1.0));
    }

    #[test]
    fn staging_dir_is_a_sibling() {
        let id = Uuid::nil();
        let staged = staging_path(Path::new("data/faiss_index"), &id).unwrap();
        assert_eq!(staged.parent(), Some(Path::new("data")));
        assert!(staged.to_string_lossy().contains("faiss_index.staging-"));
        assert!(staging_path(Path::new("/"), &id).is_err());
    }
}
