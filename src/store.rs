//! Combined vector store.
//!
//! [`VectorStore`] owns the vector index, the chunk metadata, the dedup
//! hash set and the retained vector matrix behind one type with a single
//! append path, so the positional alignment between index offsets and
//! chunk metadata cannot drift.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};

use crate::embedding::Embedder;
use crate::error::{PipelineError, Result};
use crate::index::{IndexKind, IndexParams, VectorIndex};
use crate::score::ScoreMode;
use crate::types::{Chunk, IndexState, SearchHit};

/// Index, chunk metadata, dedup hashes and retained vectors as one unit.
///
/// The index is created lazily by the first [`Self::add_chunks`] call,
/// which also fixes the vector dimension and trains IVF kinds on that
/// first batch.
pub struct VectorStore<E> {
    pub(crate) embedder: E,
    pub(crate) kind: IndexKind,
    pub(crate) params: IndexParams,
    pub(crate) index: Option<VectorIndex>,
    pub(crate) chunks: Vec<Chunk>,
    pub(crate) hashes: HashSet<u64>,
    /// Every accepted vector, row-major, in index offset order. Kept so the
    /// index can be rebuilt with a different strategy without re-embedding.
    pub(crate) matrix: Vec<f32>,
}

impl<E> fmt::Debug for VectorStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("kind", &self.kind)
            .field("chunks", &self.chunks.len())
            .field("built", &self.index.is_some())
            .finish_non_exhaustive()
    }
}

// Accessors that never touch the embedder stay unbounded so callers
// (including `Debug` impls) can use them without an `Embedder` bound.
impl<E> VectorStore<E> {
    /// Creates an empty store. No index exists until the first append.
    #[must_use]
    pub fn new(embedder: E, kind: IndexKind, params: IndexParams) -> Self {
        Self {
            embedder,
            kind,
            params,
            index: None,
            chunks: Vec::new(),
            hashes: HashSet::new(),
            matrix: Vec::new(),
        }
    }

    /// The embedding adapter this store was created with.
    #[must_use]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Whether the index has been built.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.index.is_some()
    }

    /// Number of accepted chunks (equal to the number of indexed vectors).
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunks have been accepted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether a chunk with this content hash was already accepted.
    #[must_use]
    pub fn contains_hash(&self, hash: u64) -> bool {
        self.hashes.contains(&hash)
    }

    /// Observable index state, if an index exists yet.
    #[must_use]
    pub fn state(&self) -> Option<IndexState> {
        self.index.as_ref().map(VectorIndex::state)
    }

    /// Logs and returns a summary of the store for diagnostics.
    pub fn describe(&self) -> Option<IndexState> {
        let state = self.state();
        match &state {
            Some(s) => info!(
                kind = %s.kind,
                dimension = s.dimension,
                trained = s.trained,
                vectors = s.vectors_total,
                "vector store summary"
            ),
            None => info!("vector store summary: index not built yet"),
        }
        state
    }

    /// Chunks in index offset order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

impl<E: Embedder> VectorStore<E> {
    /// The single append path: accepts aligned chunks and vectors, builds
    /// the index on first use, and records content hashes.
    ///
    /// The batch must be free of duplicates, both against the store and
    /// internally; callers filter via [`Self::contains_hash`] first. On any
    /// error nothing is appended.
    pub fn add_chunks(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<usize> {
        if chunks.len() != vectors.len() {
            return Err(PipelineError::Input(format!(
                "got {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(0);
        }
        let mut batch_hashes = HashSet::with_capacity(chunks.len());
        for chunk in &chunks {
            if self.hashes.contains(&chunk.content_hash) || !batch_hashes.insert(chunk.content_hash)
            {
                return Err(PipelineError::Duplicate {
                    source_id: chunk.source_id.clone(),
                });
            }
        }

        match &mut self.index {
            Some(index) => index.add(&vectors)?,
            None => self.index = Some(VectorIndex::build(self.kind, &self.params, &vectors)?),
        }
        for v in &vectors {
            self.matrix.extend_from_slice(v);
        }
        self.hashes.extend(chunks.iter().map(|c| c.content_hash));
        let added = chunks.len();
        self.chunks.extend(chunks);
        Ok(added)
    }

    /// Embeds the query and returns scored hits, best match first in the
    /// index engine's ordering.
    ///
    /// Hits scoring below `min_score` are dropped; offsets with no aligned
    /// chunk are dropped with a warning.
    pub fn search(
        &self,
        query: &str,
        k: usize,
        mode: ScoreMode,
        min_score: f32,
    ) -> Result<Vec<SearchHit>> {
        let index = self.index.as_ref().ok_or_else(|| {
            PipelineError::State("cannot search before the index is built".into())
        })?;
        let query_vector = self
            .embedder
            .embed_query(query)
            .map_err(PipelineError::Embedding)?;

        let mut hits = Vec::new();
        for (offset, distance) in index.search(&query_vector, k)? {
            let Some(chunk) = self.chunks.get(offset) else {
                warn!(offset, chunks = self.chunks.len(), "index offset has no aligned chunk");
                continue;
            };
            let score = mode.convert(distance);
            if score >= min_score {
                hits.push(SearchHit {
                    chunk: chunk.clone(),
                    score,
                    distance,
                });
            }
        }
        Ok(hits)
    }

    /// Rebuilds the index with a different strategy from the retained
    /// vector matrix, without re-embedding.
    pub fn rebuild_index(&mut self, kind: IndexKind, params: IndexParams) -> Result<()> {
        let dim = self
            .index
            .as_ref()
            .map(VectorIndex::dim)
            .ok_or_else(|| PipelineError::State("no index to rebuild".into()))?;
        let vectors: Vec<Vec<f32>> = self.matrix.chunks_exact(dim).map(<[f32]>::to_vec).collect();
        let index = VectorIndex::build(kind, &params, &vectors)?;
        self.kind = kind;
        self.params = params;
        self.index = Some(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::HashEmbedder;

    fn chunk(text: &str, idx: usize) -> Chunk {
        Chunk::new(text.to_string(), "doc".to_string(), 1, idx)
    }

    fn store(kind: IndexKind) -> VectorStore<HashEmbedder> {
        VectorStore::new(HashEmbedder::new(16), kind, IndexParams::default())
    }

    fn populated(kind: IndexKind) -> (VectorStore<HashEmbedder>, Vec<&'static str>) {
        let texts = vec!["alpha text", "beta text", "gamma text", "delta text"];
        let mut store = store(kind);
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| chunk(t, i))
            .collect();
        let vectors: Vec<Vec<f32>> = texts
            .iter()
            .map(|t| store.embedder().embed_one(t))
            .collect();
        store.add_chunks(chunks, vectors).unwrap();
        (store, texts)
    }

    #[test]
    fn first_append_builds_the_index() {
        let (store, _) = populated(IndexKind::FlatL2);
        let state = store.state().unwrap();
        assert_eq!(state.kind, IndexKind::FlatL2);
        assert_eq!(state.dimension, 16);
        assert_eq!(state.vectors_total, 4);
        assert!(state.trained);
    }

    #[test]
    fn indexed_chunk_is_its_own_top_hit_for_both_flat_kinds() {
        for kind in [IndexKind::FlatL2, IndexKind::FlatIp] {
            let (store, texts) = populated(kind);
            for text in texts {
                let hits = store.search(text, 1, ScoreMode::Reciprocal, 0.0).unwrap();
                assert_eq!(hits[0].chunk.text, text, "{kind}");
            }
        }
    }

    #[test]
    fn duplicate_hashes_are_rejected_without_appending() {
        let (mut store, _) = populated(IndexKind::FlatL2);
        let v = store.embedder().embed_one("alpha text");
        let err = store
            .add_chunks(vec![chunk("alpha text", 9)], vec![v])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Duplicate { .. }));
        assert_eq!(store.len(), 4);
        assert_eq!(store.hashes.len(), 4);
    }

    #[test]
    fn misaligned_batch_is_rejected() {
        let mut store = store(IndexKind::FlatL2);
        let err = store
            .add_chunks(vec![chunk("a", 0)], Vec::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
        assert!(store.is_empty());
        assert!(!store.is_built());
    }

    #[test]
    fn search_before_build_is_a_state_error() {
        let store = store(IndexKind::FlatL2);
        assert!(matches!(
            store.search("anything", 3, ScoreMode::Reciprocal, 0.0),
            Err(PipelineError::State(_))
        ));
    }

    #[test]
    fn failed_append_leaves_counts_unchanged() {
        let (mut store, _) = populated(IndexKind::FlatL2);
        let err = store
            .add_chunks(vec![chunk("fresh text", 5)], vec![vec![0.0; 3]])
            .unwrap_err();
        assert!(matches!(err, PipelineError::DimensionMismatch { .. }));
        assert_eq!(store.len(), 4);
        assert_eq!(store.hashes.len(), 4);
        assert_eq!(store.matrix.len(), 4 * 16);
    }

    #[test]
    fn desynced_offsets_are_dropped_not_panicked() {
        let (mut store, _) = populated(IndexKind::FlatL2);
        store.chunks.pop();
        let hits = store.search("alpha text", 4, ScoreMode::Reciprocal, 0.0).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn rebuild_switches_strategy_without_re_embedding() {
        let (mut store, texts) = populated(IndexKind::FlatL2);
        store
            .rebuild_index(IndexKind::FlatIp, IndexParams::default())
            .unwrap();
        assert_eq!(store.state().unwrap().kind, IndexKind::FlatIp);
        assert_eq!(store.len(), 4);
        let hits = store.search(texts[2], 1, ScoreMode::Negative, f32::MIN).unwrap();
        assert_eq!(hits[0].chunk.text, texts[2]);
    }

    #[test]
    fn min_score_filters_hits() {
        let (store, texts) = populated(IndexKind::FlatL2);
        // Reciprocal of a zero distance is exactly 1.0; every other hit
        // scores strictly below it.
        let hits = store.search(texts[0], 4, ScoreMode::Reciprocal, 1.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, texts[0]);
        assert_eq!(hits[0].score, 1.0);
    }
}
