use thiserror::Error;

use crate::types::IdentitySpace;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure modes of a query or an ingestion call.
///
/// Only `InvalidRequest` is a caller mistake. `EmbeddingUnavailable` and
/// `VectorIndexUnavailable` are normally absorbed by falling back to the
/// lexical path; `LexicalIndexUnavailable` has no fallback.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding service unavailable: {source}")]
    EmbeddingUnavailable {
        #[source]
        source: BoxError,
    },

    #[error("Vector index unavailable: {source}")]
    VectorIndexUnavailable {
        #[source]
        source: BoxError,
    },

    #[error("Lexical index unavailable: {source}")]
    LexicalIndexUnavailable {
        #[source]
        source: BoxError,
    },

    #[error("Cannot fuse a {left} ranking with a {right} ranking")]
    FusionIdentityMismatch { left: IdentitySpace, right: IdentitySpace },

    #[error("Search cancelled")]
    Cancelled,

    #[error("Storage operation failed: {source}")]
    Storage {
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub fn embedding(source: impl Into<BoxError>) -> Self {
        Self::EmbeddingUnavailable { source: source.into() }
    }

    pub fn vector_index(source: impl Into<BoxError>) -> Self {
        Self::VectorIndexUnavailable { source: source.into() }
    }

    pub fn lexical_index(source: impl Into<BoxError>) -> Self {
        Self::LexicalIndexUnavailable { source: source.into() }
    }

    pub fn storage(source: impl Into<BoxError>) -> Self {
        Self::Storage { source: source.into() }
    }

    /// True for errors the caller caused; these are never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
