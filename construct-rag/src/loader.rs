//! Source document loaders.
//!
//! Loaders turn a file into a [`SourceDocument`]: an ordered list of raw page
//! texts. They do no normalization; that happens in the index builder.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::document::{Page, SourceDocument};
use crate::error::{RagError, Result};

/// Reads a source file into pages of extracted text.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentUnreadable`] if the file is missing or
    /// cannot be decoded.
    async fn load(&self, path: &Path) -> Result<SourceDocument>;
}

fn unreadable(path: &Path, reason: impl Into<String>) -> RagError {
    RagError::DocumentUnreadable { path: path.to_path_buf(), reason: reason.into() }
}

fn document_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Extracts text page by page from PDF files with `lopdf`.
///
/// Extraction runs on the blocking thread pool. A page whose content stream
/// cannot be decoded is kept as an empty page so page numbers stay aligned.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

fn extract_pdf_pages(path: &Path) -> Result<Vec<Page>> {
    let doc = lopdf::Document::load(path)
        .map_err(|e| unreadable(path, format!("failed to load PDF: {e}")))?;
    if doc.is_encrypted() {
        return Err(unreadable(path, "PDF is encrypted"));
    }

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(unreadable(path, "PDF has no pages"));
    }

    let pages = page_numbers
        .into_iter()
        .enumerate()
        .map(|(i, number)| {
            let text = doc.extract_text(&[number]).unwrap_or_else(|e| {
                warn!(path = %path.display(), page = number, error = %e, "could not extract page text");
                String::new()
            });
            Page { number: i + 1, text }
        })
        .collect();
    Ok(pages)
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn load(&self, path: &Path) -> Result<SourceDocument> {
        if tokio::fs::metadata(path).await.is_err() {
            return Err(unreadable(path, "file not found"));
        }

        let owned: PathBuf = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || extract_pdf_pages(&owned))
            .await
            .map_err(|e| unreadable(path, format!("PDF extraction aborted: {e}")))??;

        debug!(path = %path.display(), page_count = pages.len(), "loaded PDF");
        Ok(SourceDocument {
            id: document_id(path),
            pages,
            source_uri: Some(path.display().to_string()),
        })
    }
}

/// Reads UTF-8 text files; a form feed (`\x0c`) starts a new page.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

#[async_trait]
impl DocumentLoader for TextLoader {
    async fn load(&self, path: &Path) -> Result<SourceDocument> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| unreadable(path, e.to_string()))?;

        let document = SourceDocument::from_pages(document_id(path), content.split('\x0c'))
            .with_source_uri(path.display().to_string());
        debug!(path = %path.display(), page_count = document.pages.len(), "loaded text file");
        Ok(document)
    }
}

/// Picks [`PdfLoader`] for `.pdf` files and [`TextLoader`] for everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader {
    pdf: PdfLoader,
    text: TextLoader,
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, path: &Path) -> Result<SourceDocument> {
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"));
        if is_pdf { self.pdf.load(path).await } else { self.text.load(path).await }
    }
}
