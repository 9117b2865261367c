//! Index build orchestration.
//!
//! The [`IndexBuilder`] turns a source document into a persisted
//! [`VectorIndex`]: load → normalize → chunk → embed → save.
//!
//! # Example
//!
//! ```rust,ignore
//! use construct_rag::{IndexBuilder, RagConfig, HashingEmbeddingProvider};
//!
//! let builder = IndexBuilder::new(RagConfig::default(), Arc::new(HashingEmbeddingProvider::default()))?;
//! let report = builder.build_from_path("docs/handbook.pdf", "faiss_index").await?;
//! ```
//!
//! Builds always replace the artifact at the target path. Running two builds
//! against one path, or querying a path while it is rebuilt, is not
//! coordinated here; callers must serialize those themselves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::{ChunkingScope, RagConfig};
use crate::document::{Chunk, Document, SourceDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingErrorKind, RagError, Result};
use crate::index::VectorIndex;
use crate::loader::{DocumentLoader, FileLoader};
use crate::normalize::clean_text;

/// Summary of a completed build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// Number of pages in the source document.
    pub page_count: usize,
    /// Number of chunks stored in the index.
    pub chunk_count: usize,
    /// Dimensionality of the stored vectors.
    pub dimensions: usize,
    /// Embedding model recorded in the index.
    pub model_id: String,
    /// Where the index was written.
    pub index_path: PathBuf,
    /// Identifier of the written index.
    pub build_id: Uuid,
}

/// Builds and persists a [`VectorIndex`] from a source document.
///
/// Holds shared handles only, so one builder can be reused for many builds.
pub struct IndexBuilder {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    loader: Arc<dyn DocumentLoader>,
}

impl IndexBuilder {
    /// Create a builder using a [`RecursiveChunker`] sized from `config` and
    /// the extension-dispatching [`FileLoader`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidParameter`] if `config` does not validate.
    pub fn new(config: RagConfig, embedding_provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        let chunker = RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            config,
            embedding_provider,
            chunker: Arc::new(chunker),
            loader: Arc::new(FileLoader::default()),
        })
    }

    /// Replace the chunker.
    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// Replace the document loader.
    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Load `source` with the configured loader, then [`build`](Self::build) it.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build); loader failures surface as
    /// [`RagError::DocumentUnreadable`].
    pub async fn build_from_path(
        &self,
        source: impl AsRef<Path>,
        index_path: impl AsRef<Path>,
    ) -> Result<BuildReport> {
        let source = source.as_ref();
        info!(source = %source.display(), "loading source document");
        let document = self.loader.load(source).await.inspect_err(|e| {
            error!(source = %source.display(), error = %e, "failed to load source document");
        })?;
        self.build(&document, index_path).await
    }

    /// Normalize, chunk, embed, and persist `document` at `index_path`.
    ///
    /// Nothing is written unless every step before saving succeeds.
    ///
    /// # Errors
    ///
    /// - [`RagError::DocumentUnreadable`] if the document has no pages or no text
    /// - [`RagError::Embedding`] if the provider fails or returns the wrong number of vectors
    /// - [`RagError::DimensionMismatch`] if the provider returns vectors of differing lengths
    /// - [`RagError::Io`] if the index cannot be written
    pub async fn build(
        &self,
        document: &SourceDocument,
        index_path: impl AsRef<Path>,
    ) -> Result<BuildReport> {
        let index_path = index_path.as_ref();
        let chunks = self.prepare(document)?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embed_texts(&texts).await.inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during build");
        })?;

        let dimensions =
            vectors.first().map(Vec::len).unwrap_or_else(|| self.embedding_provider.dimensions());
        let index =
            VectorIndex::build(chunks, vectors, self.embedding_provider.model_id(), dimensions)?;
        index.save(index_path).await?;

        let report = BuildReport {
            page_count: document.pages.len(),
            chunk_count: index.len(),
            dimensions: index.dimensions(),
            model_id: index.model_id().to_string(),
            index_path: index_path.to_path_buf(),
            build_id: index.manifest().build_id,
        };
        info!(
            document.id = %document.id,
            page_count = report.page_count,
            chunk_count = report.chunk_count,
            model = %report.model_id,
            "built index"
        );
        Ok(report)
    }

    /// Normalize pages and cut them into chunks without embedding them.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentUnreadable`] if the document has no pages
    /// or every page is blank after normalization.
    pub fn prepare(&self, document: &SourceDocument) -> Result<Vec<Chunk>> {
        let origin = || PathBuf::from(document.source_uri.as_deref().unwrap_or(document.id.as_str()));

        if document.pages.is_empty() {
            return Err(RagError::DocumentUnreadable {
                path: origin(),
                reason: "document has no pages".to_string(),
            });
        }

        let pages: Vec<(usize, String)> = document
            .pages
            .iter()
            .map(|page| (page.number, clean_text(&page.text)))
            .filter(|(_, text)| !text.is_empty())
            .collect();
        if pages.is_empty() {
            return Err(RagError::DocumentUnreadable {
                path: origin(),
                reason: "no extractable text".to_string(),
            });
        }

        let mut base_metadata = HashMap::new();
        if let Some(uri) = &document.source_uri {
            base_metadata.insert("source".to_string(), uri.clone());
        }

        let units: Vec<Document> = match self.config.chunking_scope {
            ChunkingScope::Document => vec![Document {
                id: document.id.clone(),
                text: pages.into_iter().map(|(_, text)| text).collect::<Vec<_>>().join(" "),
                metadata: base_metadata,
                source_uri: document.source_uri.clone(),
            }],
            ChunkingScope::Page => pages
                .into_iter()
                .map(|(number, text)| {
                    let mut metadata = base_metadata.clone();
                    metadata.insert("page".to_string(), number.to_string());
                    Document {
                        id: format!("{}_p{number}", document.id),
                        text,
                        metadata,
                        source_uri: document.source_uri.clone(),
                    }
                })
                .collect(),
        };

        Ok(units.iter().flat_map(|unit| self.chunker.chunk(unit)).collect())
    }

    /// Embed texts in groups of `embedding_batch_size`, checking the vector count.
    async fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for group in texts.chunks(self.config.embedding_batch_size) {
            let batch = self.embedding_provider.embed_batch(group).await?;
            if batch.len() != group.len() {
                return Err(RagError::embedding(
                    self.embedding_provider.model_id(),
                    EmbeddingErrorKind::MalformedResponse,
                    format!("expected {} embeddings, got {}", group.len(), batch.len()),
                ));
            }
            vectors.extend(batch);
        }
        Ok(vectors)
    }
}
