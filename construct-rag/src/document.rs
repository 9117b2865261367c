//! Data types for source documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One page of extracted text, numbered from 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// Raw extracted text.
    pub text: String,
}

/// A loaded source document: an ordered sequence of pages.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Identifier used as the prefix of chunk IDs.
    pub id: String,
    /// Pages in reading order.
    pub pages: Vec<Page>,
    /// Optional URI pointing to the original source.
    pub source_uri: Option<String>,
}

impl SourceDocument {
    /// Create a document from page texts, numbering pages from 1.
    pub fn from_pages<I, S>(id: impl Into<String>, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page { number: i + 1, text: text.into() })
            .collect();
        Self { id: id.into(), pages, source_uri: None }
    }

    /// Attach a source URI.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }
}

/// A unit of normalized text handed to a [`Chunker`](crate::chunking::Chunker).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The normalized text content of the document.
    pub text: String,
    /// Key-value metadata copied onto every chunk.
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

/// A segment of a [`Document`] with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Character offset of the first character within the parent document.
    pub offset: usize,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The cosine similarity score (higher is more relevant).
    pub score: f32,
}
