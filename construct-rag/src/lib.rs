//! # construct-rag
//!
//! Retrieval for construction and civil-engineering question answering.
//!
//! The crate covers two paths:
//!
//! - **Build** ([`IndexBuilder`]): load a source document, normalize each page
//!   ([`clean_text`]), cut the text into overlapping chunks ([`Chunker`]),
//!   embed every chunk ([`EmbeddingProvider`]), and persist a [`VectorIndex`].
//! - **Query** ([`Retriever`]): load the index, embed the question, and return
//!   the top-k chunk texts, best match first.
//!
//! The generative answer step is out of scope; [`RetrievalContext`] is what
//! a prompt builder consumes.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use construct_rag::{HashingEmbeddingProvider, IndexBuilder, RagConfig, Retriever};
//!
//! let config = RagConfig::default();
//! let provider = Arc::new(HashingEmbeddingProvider::default());
//!
//! IndexBuilder::new(config.clone(), provider.clone())?
//!     .build_from_path("docs/handbook.pdf", &config.index_path)
//!     .await?;
//!
//! let passages = Retriever::new(config.clone(), provider)?
//!     .query_rag("How long does concrete take to cure?", &config.index_path, config.top_k)
//!     .await?;
//! ```

pub mod builder;
pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod hashing;
pub mod index;
pub mod loader;
pub mod normalize;
pub mod retriever;

pub use builder::{BuildReport, IndexBuilder};
pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker, TextSpan};
pub use config::{ChunkingScope, RagConfig, RagConfigBuilder};
pub use context::RetrievalContext;
pub use document::{Chunk, Document, Page, SearchResult, SourceDocument};
pub use embedding::EmbeddingProvider;
pub use error::{EmbeddingErrorKind, RagError, Result};
pub use gemini::{GeminiEmbeddingProvider, TaskType};
pub use hashing::HashingEmbeddingProvider;
pub use index::{IndexManifest, VectorIndex};
pub use loader::{DocumentLoader, FileLoader, PdfLoader, TextLoader};
pub use normalize::clean_text;
pub use retriever::Retriever;
