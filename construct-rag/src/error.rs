//! Error types for the `construct-rag` crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The failure class of an embedding request.
///
/// Used by callers to decide whether a retry makes sense; see
/// [`EmbeddingErrorKind::is_transient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingErrorKind {
    /// The request did not complete within the configured timeout.
    Timeout,
    /// The connection could not be established or was interrupted.
    Network,
    /// The provider rejected the request because of rate limiting.
    RateLimited,
    /// The credentials were missing or rejected.
    Authentication,
    /// The provider reported a server-side failure.
    Unavailable,
    /// The provider rejected the request itself (bad model, oversized input, ...).
    Rejected,
    /// The response could not be decoded or did not contain the expected vectors.
    MalformedResponse,
}

impl EmbeddingErrorKind {
    /// Whether the same request may succeed if retried later.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::Network | Self::RateLimited | Self::Unavailable)
    }
}

impl fmt::Display for EmbeddingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::RateLimited => "rate limited",
            Self::Authentication => "authentication",
            Self::Unavailable => "unavailable",
            Self::Rejected => "rejected",
            Self::MalformedResponse => "malformed response",
        };
        f.write_str(label)
    }
}

/// Errors that can occur while building or querying an index.
#[derive(Debug, Error)]
pub enum RagError {
    /// The source document is missing, corrupt, or has no extractable text.
    #[error("Document unreadable ({}): {reason}", path.display())]
    DocumentUnreadable {
        /// Path of the source document.
        path: PathBuf,
        /// A description of the failure.
        reason: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}, {kind}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// The failure class.
        kind: EmbeddingErrorKind,
        /// A description of the failure.
        message: String,
    },

    /// No index artifact exists at the given path.
    #[error("Index not found at {}", path.display())]
    IndexNotFound {
        /// The path that was searched.
        path: PathBuf,
    },

    /// An index artifact exists but could not be decoded.
    #[error("Index at {} is corrupt: {message}", path.display())]
    IndexCorrupt {
        /// The path of the artifact.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The index was built with a different embedding model than the one in use.
    #[error("Embedding model mismatch: index built with '{found}', provider uses '{expected}'")]
    ModelMismatch {
        /// The model identifier of the configured provider.
        expected: String,
        /// The model identifier recorded in the index.
        found: String,
    },

    /// Vectors of different dimensionality were mixed.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality of the index.
        expected: usize,
        /// The dimensionality that was supplied.
        actual: usize,
    },

    /// A parameter was rejected before any I/O took place.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// An I/O error while writing the index.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Shorthand for an [`RagError::Embedding`] error.
    pub fn embedding(
        provider: impl Into<String>,
        kind: EmbeddingErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Embedding { provider: provider.into(), kind, message: message.into() }
    }

    /// Whether retrying the failed operation may succeed.
    ///
    /// Only embedding failures with a transient cause are retryable; every
    /// other error is permanent for the given inputs.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
