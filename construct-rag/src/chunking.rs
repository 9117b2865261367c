//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`]: ends chunks at sentence, clause, then word boundaries
//! - [`FixedSizeChunker`]: hard character cuts with a constant step
//!
//! Both count characters (Unicode scalar values), never bytes, and both
//! guarantee that adjacent chunks share at least `chunk_overlap` characters
//! and that the chunks, with overlaps removed, reproduce the input exactly.

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A half-open character range `[start, end)` within a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    /// Offset of the first character.
    pub start: usize,
    /// Offset one past the last character.
    pub end: usize,
}

impl TextSpan {
    /// Number of characters covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no characters.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the index builder.
pub trait Chunker: Send + Sync {
    /// Split text into ordered, overlapping character spans.
    ///
    /// Returns an empty `Vec` for empty text.
    fn split(&self, text: &str) -> Vec<TextSpan>;

    /// Split a document into chunks.
    ///
    /// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk
    /// inherits the document's metadata plus a `chunk_index` field, and has an
    /// empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = document.text.chars().collect();
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, span)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), i.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    text: chars[span.start..span.end].iter().collect(),
                    offset: span.start,
                    embedding: Vec::new(),
                    metadata,
                    document_id: document.id.clone(),
                }
            })
            .collect()
    }
}

fn check_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidParameter("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidParameter(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Cuts ignore word and sentence boundaries, so a chunk may start or end
/// mid-word. Prefer [`RecursiveChunker`] unless exact, predictable offsets
/// matter more than retrieval quality.
///
/// # Example
///
/// ```rust,ignore
/// use construct_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidParameter`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn split(&self, text: &str) -> Vec<TextSpan> {
        let len = text.chars().count();
        let mut spans = Vec::new();
        if len == 0 {
            return spans;
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            spans.push(TextSpan { start, end });
            if end == len {
                break;
            }
            start += step;
        }
        spans
    }
}

/// Splits text at the most natural boundary available in each window.
///
/// A chunk ends, in order of preference, right after sentence punctuation
/// (`.`, `!`, `?` followed by whitespace), right after clause punctuation
/// (`;`, `:`, `,` followed by whitespace), or before a space. Only the second
/// half of each window is searched so chunks stay close to `chunk_size`.
/// When no boundary exists the window is cut at `chunk_size` characters.
///
/// The next chunk starts at the last word start that still leaves
/// `chunk_overlap` shared characters, or exactly `chunk_overlap` characters
/// before the previous end when the overlap region contains no word start.
///
/// # Example
///
/// ```rust,ignore
/// use construct_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(2000, 200)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: minimum number of overlapping characters between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidParameter`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

const SENTENCE_ENDINGS: &[char] = &['.', '!', '?'];
const CLAUSE_ENDINGS: &[char] = &[';', ':', ','];

/// Find the latest chunk end in `lo..=hi`, preferring sentence, then clause,
/// then word boundaries. `hi` must be less than `chars.len()`.
fn find_break(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    let after_punctuation = |set: &[char]| {
        (lo.max(1)..=hi)
            .rev()
            .find(|&p| set.contains(&chars[p - 1]) && chars[p].is_whitespace())
    };

    after_punctuation(SENTENCE_ENDINGS)
        .or_else(|| after_punctuation(CLAUSE_ENDINGS))
        .or_else(|| {
            (lo.max(1)..=hi)
                .rev()
                .find(|&p| chars[p].is_whitespace() && !chars[p - 1].is_whitespace())
        })
}

/// Pick where the chunk after `[start, end)` begins.
fn next_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }
    let target = end - overlap;
    let lo = (start + 1).max(target.saturating_sub(overlap));
    (lo..=target)
        .rev()
        .find(|&q| !chars[q].is_whitespace() && chars[q - 1].is_whitespace())
        .unwrap_or(target)
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<TextSpan> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut spans = Vec::new();
        if len == 0 {
            return spans;
        }

        let mut start = 0;
        let mut prev_end = 0;
        loop {
            let window_end = (start + self.chunk_size).min(len);
            if window_end == len {
                spans.push(TextSpan { start, end: len });
                break;
            }

            // end > start + overlap keeps the next start strictly ahead of this one;
            // end > prev_end keeps a chunk from nesting inside its predecessor.
            let min_end = (start + (self.chunk_size / 2).max(self.chunk_overlap + 1))
                .max(prev_end + 1);
            let end = find_break(&chars, min_end, window_end).unwrap_or(window_end);
            spans.push(TextSpan { start, end });
            prev_end = end;
            start = next_start(&chars, start, end, self.chunk_overlap);
        }
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_sentence_boundary() {
        let chars: Vec<char> = "Cure slabs. Keep them wet".chars().collect();
        assert_eq!(find_break(&chars, 5, 20), Some(11));
    }

    #[test]
    fn falls_back_to_word_boundary() {
        let chars: Vec<char> = "rebar grade sixty steel".chars().collect();
        assert_eq!(find_break(&chars, 6, 15), Some(11));
    }

    #[test]
    fn no_boundary_in_a_single_word() {
        let chars: Vec<char> = "reinforcement".chars().collect();
        assert_eq!(find_break(&chars, 3, 10), None);
    }

    #[test]
    fn next_start_snaps_to_word_start() {
        let chars: Vec<char> = "aaaa bbbb cccc dddd".chars().collect();
        // end = 14, overlap = 3 -> target 11, latest word start at or before is 10
        assert_eq!(next_start(&chars, 0, 14, 3), 10);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(RecursiveChunker::new(100, 100).is_err());
        assert!(FixedSizeChunker::new(0, 0).is_err());
    }
}
