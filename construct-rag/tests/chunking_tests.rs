//! Property tests for chunk boundaries.

use std::collections::HashMap;

use construct_rag::chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
use construct_rag::document::{Chunk, Document};
use proptest::prelude::*;

fn document(text: &str) -> Document {
    Document {
        id: "handbook".to_string(),
        text: text.to_string(),
        metadata: HashMap::from([("source".to_string(), "handbook.pdf".to_string())]),
        source_uri: None,
    }
}

/// A chunk size and an overlap strictly smaller than it.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..80).prop_flat_map(|size| (Just(size), 0..size))
}

/// Prose-like text with sentence and clause punctuation and some non-ASCII letters.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zé ]{0,12}([.,;:!?] [a-zé ]{1,15}){0,25}"
}

/// Check that `chunks` tile `text` in order, stay within `size`, and share
/// at least `overlap` characters with their predecessor.
fn check_chunks(text: &str, chunks: &[Chunk], size: usize, overlap: usize) -> Result<(), TestCaseError> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        prop_assert!(chunks.is_empty());
        return Ok(());
    }

    prop_assert!(!chunks.is_empty());
    prop_assert_eq!(chunks[0].offset, 0);

    let mut prev: Option<(usize, usize)> = None;
    for chunk in chunks {
        let len = chunk.text.chars().count();
        let end = chunk.offset + len;
        prop_assert!(len > 0, "empty chunk {}", chunk.id);
        prop_assert!(len <= size, "chunk {} has {} chars, limit {}", chunk.id, len, size);
        prop_assert!(end <= chars.len());

        let expected: String = chars[chunk.offset..end].iter().collect();
        prop_assert_eq!(&chunk.text, &expected);

        if let Some((prev_start, prev_end)) = prev {
            prop_assert!(chunk.offset > prev_start, "starts must advance");
            prop_assert!(end > prev_end, "ends must advance");
            prop_assert!(chunk.offset <= prev_end, "gap before {}", chunk.id);
            prop_assert!(
                prev_end - chunk.offset >= overlap,
                "overlap {} below {} at {}",
                prev_end - chunk.offset,
                overlap,
                chunk.id
            );
        }
        prev = Some((chunk.offset, end));
    }

    prop_assert_eq!(prev.map(|(_, end)| end), Some(chars.len()));
    Ok(())
}

mod prop_recursive_chunker {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn chunks_cover_text_within_size_and_overlap(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&document(&text));
            check_chunks(&text, &chunks, size, overlap)?;
        }

        #[test]
        fn splitting_is_deterministic(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            prop_assert_eq!(chunker.split(&text), chunker.split(&text));
        }
    }
}

mod prop_fixed_size_chunker {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn chunks_cover_text_within_size_and_overlap(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&document(&text));
            check_chunks(&text, &chunks, size, overlap)?;
        }
    }
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunker = RecursiveChunker::new(2000, 200).unwrap();
    let chunks = chunker.chunk(&document("Concrete cures over 28 days."));
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Concrete cures over 28 days.");
    assert_eq!(chunks[0].id, "handbook_0");
    assert_eq!(chunks[0].document_id, "handbook");
    assert!(chunks[0].embedding.is_empty());
}

#[test]
fn empty_text_has_no_chunks() {
    let chunker = RecursiveChunker::new(10, 2).unwrap();
    assert!(chunker.chunk(&document("")).is_empty());
}

#[test]
fn chunks_carry_document_metadata_and_index() {
    let chunker = FixedSizeChunker::new(10, 3).unwrap();
    let chunks = chunker.chunk(&document("Steel rebar reinforces tensile strength."));
    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.id, format!("handbook_{i}"));
        assert_eq!(chunk.metadata.get("chunk_index"), Some(&i.to_string()));
        assert_eq!(chunk.metadata.get("source").map(String::as_str), Some("handbook.pdf"));
    }
}

#[test]
fn fixed_size_cuts_mid_word() {
    let chunker = FixedSizeChunker::new(10, 2).unwrap();
    let texts: Vec<String> =
        chunker.chunk(&document("Foundations distribute load")).into_iter().map(|c| c.text).collect();
    assert_eq!(texts, ["Foundation", "ons distri", "ribute loa", "oad"]);
}

#[test]
fn recursive_prefers_sentence_ends() {
    let text = "Cure slabs for a week. Keep the surface wet. Avoid early loading.";
    let chunker = RecursiveChunker::new(30, 5).unwrap();
    let chunks = chunker.chunk(&document(text));
    assert_eq!(chunks[0].text, "Cure slabs for a week.");
    assert!(chunks.last().unwrap().text.ends_with("Avoid early loading."));
}

#[test]
fn counts_characters_not_bytes() {
    let text = "éééééééééé";
    let chunker = FixedSizeChunker::new(4, 1).unwrap();
    let chunks = chunker.chunk(&document(text));
    assert!(chunks.iter().all(|c| c.text.chars().count() <= 4));
    assert_eq!(chunks[0].text, "éééé");
    assert_eq!(chunks[1].offset, 3);
}
