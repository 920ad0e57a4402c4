//! Error types for vidhi-index.

use std::path::PathBuf;

use crate::vector_store::VectorStoreError;

/// Errors raised while loading, ingesting or retrieving legal text chunks.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The preprocessed corpus file does not exist.
    #[error("processed data not found at {}; run the preprocessing step first", .0.display())]
    DataNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A corpus record is structurally valid JSON but unusable.
    #[error("invalid record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    /// Embedding provider failure.
    #[error("embedding failed: {0}")]
    Embedding(#[from] vidhi_llm::LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("embedding provider returned {got} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, got: usize },

    #[error("embedding has dimension {got}, index expects {expected}")]
    DimensionMismatch { expected: u64, got: usize },
}

impl IndexError {
    /// Whether the failure came from an external provider (embedding API or
    /// vector database) rather than local data.
    #[must_use]
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::VectorStore(_))
    }

    /// Records stored by a failed upsert before it stopped.
    #[must_use]
    pub fn records_written(&self) -> usize {
        match self {
            Self::VectorStore(e) => e.records_written(),
            _ => 0,
        }
    }
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
