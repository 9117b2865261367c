//! Configuration for index building and retrieval.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default directory holding the persisted index.
pub const DEFAULT_INDEX_PATH: &str = "faiss_index";

/// Default embedding model identifier.
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";

/// How normalized pages are grouped before chunking.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingScope {
    /// Join all pages into one continuous stream; chunks may span pages.
    #[default]
    Document,
    /// Chunk every page on its own; chunks never cross a page break.
    Page,
}

/// Configuration parameters shared by the index builder and the retriever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Minimum number of characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of passages returned per query.
    pub top_k: usize,
    /// Directory holding the persisted index.
    pub index_path: PathBuf,
    /// Identifier of the embedding model used at build and query time.
    pub embedding_model: String,
    /// Whether chunks are cut from the whole document or per page.
    pub chunking_scope: ChunkingScope,
    /// Maximum number of texts sent in one embedding request.
    pub embedding_batch_size: usize,
    /// Upper bound for a single embedding request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
            top_k: 3,
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chunking_scope: ChunkingScope::Document,
            embedding_batch_size: 100,
            request_timeout_secs: 30,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The embedding request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check that the parameters are mutually consistent.
    ///
    /// Configurations deserialized from disk bypass the builder, so the
    /// builder and the pipeline entry points both call this.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidParameter`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `embedding_batch_size == 0`
    /// - `request_timeout_secs == 0`
    /// - `embedding_model` is empty
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidParameter(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidParameter(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::InvalidParameter(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(RagError::InvalidParameter(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(RagError::InvalidParameter(
                "embedding_model must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of passages returned per query.
    ///
    /// Zero is accepted and makes every query return no passages.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the index directory.
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the chunking scope.
    pub fn chunking_scope(mut self, scope: ChunkingScope) -> Self {
        self.config.chunking_scope = scope;
        self
    }

    /// Set the number of texts per embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the embedding request timeout in seconds.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn builder_rejects_inconsistent_sizes() {
        assert!(RagConfig::builder().chunk_size(0).chunk_overlap(0).build().is_err());
        assert!(RagConfig::builder().chunk_size(100).chunk_overlap(100).build().is_err());
        assert!(RagConfig::builder().embedding_batch_size(0).build().is_err());
        assert!(RagConfig::builder().request_timeout_secs(0).build().is_err());
        assert!(RagConfig::builder().embedding_model(" ").build().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: RagConfig =
            serde_json::from_str(r#"{"chunk_size": 500, "chunking_scope": "page"}"#).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.chunking_scope, ChunkingScope::Page);
        assert_eq!(config.index_path, PathBuf::from(DEFAULT_INDEX_PATH));
    }
}
