//! Error types for the indexing pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while cleaning, chunking, indexing, searching or
/// persisting documents.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration (unknown index kind, bad cluster/quantizer
    /// parameters). Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation called out of order (search/add before build, add before
    /// training, retrain after add).
    #[error("state error: {0}")]
    State(String),

    /// Invalid input for a single operation (empty document set, missing
    /// source file). The surrounding ingestion loop logs and continues.
    #[error("input error: {0}")]
    Input(String),

    /// Vector dimension does not match the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed at index creation.
        expected: usize,
        /// Dimension actually provided.
        actual: usize,
    },

    /// Chunk content was already indexed.
    #[error("duplicate content in {source_id}")]
    Duplicate {
        /// Identifier of the document containing the duplicate chunk.
        source_id: String,
    },

    /// The loader does not recognize the file's container format.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Embedding adapter failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// Reading or writing a persisted artifact failed.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        /// Path of the artifact involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization of an artifact failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
