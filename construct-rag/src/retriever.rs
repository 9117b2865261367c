//! Top-k retrieval against a persisted index.
//!
//! # Example
//!
//! ```rust,ignore
//! use construct_rag::{Retriever, RagConfig};
//!
//! let retriever = Retriever::new(RagConfig::default(), Arc::new(provider))?;
//! let passages = retriever.query_rag("How long does concrete take to cure?", "faiss_index", 3).await?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::context::RetrievalContext;
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{VectorIndex, read_manifest};

/// Answers questions with the most similar chunks of a persisted index.
///
/// By default every query loads its own copy of the index, so concurrent
/// queries share nothing but the embedding provider. With
/// [`with_cache`](Self::with_cache) loaded indexes are kept per path and
/// shared between queries; each query still reads the manifest and reloads
/// the index when its build id changed, swapping the cached copy under a
/// write lock so readers see either the old or the new index, never a mix.
pub struct Retriever {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    cache: Option<RwLock<HashMap<PathBuf, Arc<VectorIndex>>>>,
}

impl Retriever {
    /// Create a retriever that loads the index on every query.
    ///
    /// `embedding_provider` must use the model the index was built with.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidParameter`] if `config` does not validate.
    pub fn new(config: RagConfig, embedding_provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, embedding_provider, cache: None })
    }

    /// Keep loaded indexes in memory between queries.
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(RwLock::new(HashMap::new()));
        self
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return the `k` chunk texts most similar to `question`, best first.
    ///
    /// An empty index or `k == 0` yields an empty list rather than an error.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotFound`] if `index_path` holds no index
    /// - [`RagError::IndexCorrupt`] if the index cannot be decoded
    /// - [`RagError::ModelMismatch`] if the index was built with another model
    /// - [`RagError::Embedding`] if embedding the question fails
    /// - [`RagError::DimensionMismatch`] if the question vector does not fit the index
    pub async fn query_rag(
        &self,
        question: &str,
        index_path: impl AsRef<Path>,
        k: usize,
    ) -> Result<Vec<String>> {
        let results = self.search(question, index_path, k).await?;
        Ok(results.into_iter().map(|r| r.chunk.text).collect())
    }

    /// Like [`query_rag`](Self::query_rag) but keeps chunks and scores.
    ///
    /// # Errors
    ///
    /// See [`query_rag`](Self::query_rag).
    pub async fn search(
        &self,
        question: &str,
        index_path: impl AsRef<Path>,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let index_path = index_path.as_ref();
        let index = self.open(index_path).await?;

        if index.model_id() != self.embedding_provider.model_id() {
            error!(
                index = %index_path.display(),
                found = index.model_id(),
                expected = self.embedding_provider.model_id(),
                "embedding model mismatch"
            );
            return Err(RagError::ModelMismatch {
                expected: self.embedding_provider.model_id().to_string(),
                found: index.model_id().to_string(),
            });
        }

        if k == 0 || index.is_empty() {
            debug!(index = %index_path.display(), k, "nothing to search");
            return Ok(Vec::new());
        }

        let query = self.embedding_provider.embed(question).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;
        let results = index.search(&query, k)?;

        info!(index = %index_path.display(), k, result_count = results.len(), "query completed");
        Ok(results)
    }

    /// Retrieve context for `question` using the configured index path and `top_k`.
    ///
    /// # Errors
    ///
    /// See [`query_rag`](Self::query_rag).
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalContext> {
        let passages =
            self.query_rag(question, &self.config.index_path, self.config.top_k).await?;
        Ok(RetrievalContext::from_passages(passages))
    }

    async fn open(&self, path: &Path) -> Result<Arc<VectorIndex>> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(VectorIndex::load(path).await?));
        };

        let manifest = read_manifest(path).await?;
        {
            let cached = cache.read().await;
            if let Some(index) = cached.get(path) {
                if index.manifest().build_id == manifest.build_id {
                    return Ok(Arc::clone(index));
                }
            }
        }

        let index = Arc::new(VectorIndex::load(path).await?);
        debug!(index = %path.display(), build_id = %index.manifest().build_id, "caching index");
        cache.write().await.insert(path.to_path_buf(), Arc::clone(&index));
        Ok(index)
    }
}
