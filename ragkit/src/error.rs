//! Error types for the `ragkit` crate.

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::QueryStage;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The input had the wrong shape (empty query, empty content, `top_k == 0`, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// An embedding did not match the dimension established for the store.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension the store expects.
        expected: usize,
        /// The dimension that was supplied.
        actual: usize,
    },

    /// A document was handed to the store without an embedding.
    #[error("Document '{id}' has no embedding")]
    MissingEmbedding {
        /// The ID of the offending document.
        id: String,
    },

    /// No document exists with the given ID.
    #[error("Document '{id}' not found")]
    NotFound {
        /// The ID that was looked up.
        id: String,
    },

    /// No collection is registered under the given name.
    #[error("Collection '{name}' not found")]
    CollectionNotFound {
        /// The collection name that was looked up.
        name: String,
    },

    /// Retrieval produced no documents and the caller required at least one.
    #[error("No documents available for retrieval")]
    EmptyStore,

    /// The embedding capability failed or returned an unusable response.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingFailure {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation capability failed.
    #[error("Generation error ({provider}): {message}")]
    GenerationFailure {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An ingestion batch failed. Batches before `batch_index` remain committed.
    #[error("Ingestion failed at batch {batch_index}: {source}")]
    IngestionFailure {
        /// Zero-based index of the batch that failed.
        batch_index: usize,
        /// The underlying cause.
        #[source]
        source: Box<RagError>,
    },

    /// A collaborator call did not finish in time.
    #[error("Timed out during {stage:?} after {after:?}")]
    Timeout {
        /// The query stage that timed out.
        stage: QueryStage,
        /// The configured timeout.
        after: Duration,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// The query stage this error belongs to, when it maps onto one.
    pub fn stage(&self) -> Option<QueryStage> {
        match self {
            Self::Validation(_) => Some(QueryStage::Received),
            Self::EmbeddingFailure { .. } => Some(QueryStage::Embedding),
            Self::DimensionMismatch { .. } | Self::EmptyStore => Some(QueryStage::Retrieving),
            Self::GenerationFailure { .. } => Some(QueryStage::Generating),
            Self::Timeout { stage, .. } => Some(*stage),
            Self::IngestionFailure { source, .. } => source.stage(),
            Self::MissingEmbedding { .. }
            | Self::NotFound { .. }
            | Self::CollectionNotFound { .. }
            | Self::Config(_) => None,
        }
    }

    /// Whether a caller may reasonably retry the failed operation unchanged.
    ///
    /// Only collaborator failures are transient; validation and dimension
    /// errors will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmbeddingFailure { .. }
            | Self::GenerationFailure { .. }
            | Self::Timeout { .. } => true,
            Self::IngestionFailure { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub(crate) fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingFailure { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn generation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationFailure { provider: provider.into(), message: message.into() }
    }

    /// Attribute an error raised inside an embedding call to that provider.
    pub(crate) fn into_embedding_failure(self, provider: &str) -> Self {
        match self {
            Self::EmbeddingFailure { .. } | Self::Timeout { .. } => self,
            other => Self::embedding(provider, other.to_string()),
        }
    }

    /// Attribute an error raised inside a generation call to that provider.
    pub(crate) fn into_generation_failure(self, provider: &str) -> Self {
        match self {
            Self::GenerationFailure { .. } | Self::Timeout { .. } => self,
            other => Self::generation(provider, other.to_string()),
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestion_failure_inherits_retryability() {
        let transient = RagError::IngestionFailure {
            batch_index: 1,
            source: Box::new(RagError::embedding("fake", "503")),
        };
        assert!(transient.is_retryable());
        assert_eq!(transient.stage(), Some(QueryStage::Embedding));

        let fatal = RagError::IngestionFailure {
            batch_index: 0,
            source: Box::new(RagError::DimensionMismatch { expected: 3, actual: 2 }),
        };
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = RagError::DimensionMismatch { expected: 384, actual: 768 };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 384, got 768");

        let err = RagError::NotFound { id: "doc-7".into() };
        assert_eq!(err.to_string(), "Document 'doc-7' not found");
    }
}
