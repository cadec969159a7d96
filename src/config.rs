//! Pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::index::{IndexKind, IndexParams};
use crate::score::ScoreMode;

/// What to do when a chunk's content hash is already in the dedup set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Skip only the duplicate chunk and keep ingesting the document.
    #[default]
    SkipChunk,
    /// Abort ingestion of the whole containing document on the first
    /// duplicate chunk. Strict guard against reprocessing a source.
    SkipDocument,
}

/// Configuration shared by ingestion and search.
///
/// ```
/// use chunkdex::{DedupPolicy, IndexKind, PipelineConfig};
///
/// let config = PipelineConfig::new("data/index")
///     .with_index_kind(IndexKind::IvfFlat)
///     .with_chunk_size(512)
///     .with_chunk_overlap(64)
///     .with_dedup_policy(DedupPolicy::SkipDocument);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Base path of the persisted artifact set.
    pub index_path: PathBuf,
    /// Index strategy used when the index is first built.
    pub index_kind: IndexKind,
    /// IVF tuning parameters.
    pub index_params: IndexParams,
    /// Maximum chunk length in bytes.
    pub chunk_size: usize,
    /// Trailing context shared between adjacent chunks, in bytes.
    pub chunk_overlap: usize,
    /// Chunks with a shorter stripped length are dropped.
    pub min_chunk_length: usize,
    /// Number of chunk texts per embedding call.
    pub batch_size: usize,
    /// Duplicate-chunk handling during ingestion.
    pub dedup_policy: DedupPolicy,
    /// Distance-to-score conversion used by search.
    pub score_mode: ScoreMode,
    /// Hits scoring below this are filtered out.
    pub min_score: f32,
    /// Result count when the caller does not pass one.
    pub default_top_k: usize,
    /// Persist the artifact set after each successfully ingested file.
    pub auto_save: bool,
    /// Also dump the raw vector matrix so the index can be rebuilt with a
    /// different strategy without re-embedding.
    pub save_vectors: bool,
}

impl PipelineConfig {
    /// Creates a configuration with the default chunking, dedup and search
    /// settings.
    #[must_use]
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            index_kind: IndexKind::default(),
            index_params: IndexParams::default(),
            chunk_size: 800,
            chunk_overlap: 160,
            min_chunk_length: 50,
            batch_size: 32,
            dedup_policy: DedupPolicy::default(),
            score_mode: ScoreMode::default(),
            min_score: 0.0,
            default_top_k: 5,
            auto_save: true,
            save_vectors: true,
        }
    }

    /// Sets the index strategy used when the index is first built.
    #[must_use]
    pub fn with_index_kind(mut self, kind: IndexKind) -> Self {
        self.index_kind = kind;
        self
    }

    /// Sets the IVF and PQ parameters used when the index is first built.
    #[must_use]
    pub fn with_index_params(mut self, params: IndexParams) -> Self {
        self.index_params = params;
        self
    }

    /// Sets the maximum chunk size in bytes.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets how many trailing bytes each chunk shares with the next one.
    #[must_use]
    pub fn with_chunk_overlap(mut self, chunk_overlap: usize) -> Self {
        self.chunk_overlap = chunk_overlap;
        self
    }

    /// Sets the length below which a trimmed chunk is dropped.
    #[must_use]
    pub fn with_min_chunk_length(mut self, min_chunk_length: usize) -> Self {
        self.min_chunk_length = min_chunk_length;
        self
    }

    /// Sets how many chunk texts are embedded per batch.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets what happens when a duplicate chunk is found during ingestion.
    #[must_use]
    pub fn with_dedup_policy(mut self, policy: DedupPolicy) -> Self {
        self.dedup_policy = policy;
        self
    }

    /// Sets the distance-to-score conversion applied to search hits.
    #[must_use]
    pub fn with_score_mode(mut self, mode: ScoreMode) -> Self {
        self.score_mode = mode;
        self
    }

    /// Sets the score below which search hits are dropped.
    #[must_use]
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Sets how many hits a search returns when the caller gives no `k`.
    #[must_use]
    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k;
        self
    }

    /// Sets whether the artifact set is persisted after every ingestion.
    #[must_use]
    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    /// Sets whether the raw vector matrix is persisted alongside the index.
    #[must_use]
    pub fn with_save_vectors(mut self, save_vectors: bool) -> Self {
        self.save_vectors = save_vectors;
        self
    }

    /// Checks internal consistency before any document is touched.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunk_size must be non-zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(PipelineError::Config(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be non-zero".into()));
        }
        if self.default_top_k == 0 {
            return Err(PipelineError::Config(
                "default_top_k must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::new("idx").validate().is_ok());
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let config = PipelineConfig::new("idx")
            .with_chunk_size(100)
            .with_chunk_overlap(100);
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = PipelineConfig::new("idx").with_batch_size(0);
        assert!(config.validate().is_err());
    }
}
