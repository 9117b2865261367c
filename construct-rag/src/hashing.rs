//! Deterministic offline embedding provider.
//!
//! [`HashingEmbeddingProvider`] maps text to a bag of lightly stemmed word
//! tokens and hashes each token into a fixed number of signed buckets. Texts
//! that share vocabulary get similar vectors, which is enough for tests,
//! demos, and air-gapped builds where no embedding service is reachable.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Default number of hash buckets.
pub const DEFAULT_HASHING_DIMENSIONS: usize = 256;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how",
    "in", "is", "it", "of", "on", "or", "over", "that", "the", "this", "to", "was", "what",
    "when", "which", "why", "with",
];

/// A feature-hashing [`EmbeddingProvider`] that needs no network access.
///
/// Vectors are L2-normalized; text without any content words maps to the
/// zero vector. The model id encodes the dimensionality, so indexes built with
/// different bucket counts are rejected at query time.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbeddingProvider {
    /// Create a provider with the given number of buckets.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidParameter`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::InvalidParameter(
                "hashing dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimensions, model_id: format!("hashing-v1-{dimensions}") })
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_HASHING_DIMENSIONS,
            model_id: format!("hashing-v1-{DEFAULT_HASHING_DIMENSIONS}"),
        }
    }
}

/// Lowercased alphanumeric tokens with stop words removed and common
/// inflections stripped.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .map(stem)
}

fn stem(mut token: String) -> String {
    let len = token.chars().count();
    if len > 5 && token.ends_with("ing") {
        token.truncate(token.len() - 3);
    } else if len > 4 && token.ends_with("ed") {
        token.truncate(token.len() - 2);
    } else if len > 3 && token.ends_with('s') && !token.ends_with("ss") {
        token.truncate(token.len() - 1);
    }
    // "cure", "cures" and "curing" share one stem.
    if token.chars().count() > 3 && token.ends_with('e') && !token.ends_with("ee") {
        token.truncate(token.len() - 1);
    }
    token
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_plurals_and_gerunds() {
        assert_eq!(stem("curing".to_string()), "cur");
        assert_eq!(stem("reinforced".to_string()), "reinforc");
        assert_eq!(stem("glass".to_string()), "glass");
    }

    #[test]
    fn verb_forms_share_a_stem() {
        for form in ["cure", "cures", "curing"] {
            assert_eq!(stem(form.to_string()), "cur", "{form}");
        }
        assert_eq!(stem("free".to_string()), "free");
        assert_eq!(stem("tree".to_string()), "tree");

        let provider = HashingEmbeddingProvider::default();
        assert_eq!(provider.vectorize("curing concrete"), provider.vectorize("cures concrete"));
    }

    #[test]
    fn drops_stop_words_and_punctuation() {
        let got: Vec<String> = tokens("How long does Concrete take to cure?").collect();
        assert_eq!(got, ["long", "concret", "tak", "cur"]);
    }

    #[test]
    fn vectors_are_unit_length() {
        let provider = HashingEmbeddingProvider::default();
        let v = provider.vectorize("Steel rebar reinforces tensile strength.");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn stop_words_only_is_zero_vector() {
        let provider = HashingEmbeddingProvider::new(8).unwrap();
        assert!(provider.vectorize("how is it").iter().all(|x| *x == 0.0));
    }
}
