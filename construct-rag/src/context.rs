//! Retrieved passages packaged for prompt construction.

/// Separator between passages in [`RetrievalContext::render`].
pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// The outcome of a successful retrieval.
///
/// Retrieval failures are always reported as errors, so `NoMatches` only ever
/// means the index was reachable and had nothing to offer. Callers decide how
/// an ungrounded question is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalContext {
    /// Passages ordered best match first.
    Grounded(Vec<String>),
    /// The index is empty or the query asked for zero passages.
    NoMatches,
}

impl RetrievalContext {
    /// Wrap retrieved passages, mapping an empty list to [`NoMatches`](Self::NoMatches).
    pub fn from_passages(passages: Vec<String>) -> Self {
        if passages.is_empty() { Self::NoMatches } else { Self::Grounded(passages) }
    }

    /// Whether any passage was retrieved.
    pub fn is_grounded(&self) -> bool {
        matches!(self, Self::Grounded(_))
    }

    /// The retrieved passages, empty for [`NoMatches`](Self::NoMatches).
    pub fn passages(&self) -> &[String] {
        match self {
            Self::Grounded(passages) => passages,
            Self::NoMatches => &[],
        }
    }

    /// Join the passages into one context block, or `None` without matches.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Grounded(passages) => Some(passages.join(PASSAGE_SEPARATOR)),
            Self::NoMatches => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_passages_mean_no_matches() {
        let ctx = RetrievalContext::from_passages(Vec::new());
        assert_eq!(ctx, RetrievalContext::NoMatches);
        assert!(!ctx.is_grounded());
        assert!(ctx.passages().is_empty());
        assert_eq!(ctx.render(), None);
    }

    #[test]
    fn render_joins_with_blank_line() {
        let ctx = RetrievalContext::from_passages(vec!["first".into(), "second".into()]);
        assert_eq!(ctx.render().as_deref(), Some("first\n\nsecond"));
    }
}
