//! Core data types shared across the pipeline.

use serde::{Deserialize, Serialize};

use crate::index::IndexKind;

/// A single page of raw text extracted from a source document by a loader.
///
/// Immutable after creation; consumed by the cleaner. A chunk never spans
/// two pages.
#[derive(Clone, Debug)]
pub struct PageDocument {
    /// Raw page text as the loader produced it.
    pub content: String,
    /// Identifier of the containing document (usually the file path).
    pub source_id: String,
    /// One-based page number within the document.
    pub page_number: u32,
}

impl PageDocument {
    /// Creates a page document.
    #[must_use]
    pub fn new(content: impl Into<String>, source_id: impl Into<String>, page_number: u32) -> Self {
        Self {
            content: content.into(),
            source_id: source_id.into(),
            page_number,
        }
    }
}

/// A bounded-length slice of cleaned document text, the atomic unit that
/// gets embedded and indexed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text exactly as it will be embedded.
    pub text: String,
    /// Identifier of the source document.
    pub source_id: String,
    /// Page the chunk came from.
    pub page_number: u32,
    /// Zero-based position among the retained chunks of the source
    /// document (dense: `0..N-1`, no gaps).
    pub chunk_index: usize,
    /// Content hash of `text`, the deduplication key.
    pub content_hash: u64,
}

impl Chunk {
    /// Creates a chunk, computing its content hash.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        source_id: impl Into<String>,
        page_number: u32,
        chunk_index: usize,
    ) -> Self {
        let text = text.into();
        let content_hash = crate::dedup::content_hash(&text);
        Self {
            text,
            source_id: source_id.into(),
            page_number,
            chunk_index,
            content_hash,
        }
    }
}

/// A ranked search result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matching chunk with its metadata.
    pub chunk: Chunk,
    /// Normalized score after [`ScoreMode`](crate::score::ScoreMode)
    /// conversion.
    pub score: f32,
    /// Raw distance (or inner product) reported by the index.
    pub distance: f32,
}

/// Snapshot of the index engine's lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexState {
    /// Active search strategy.
    pub kind: IndexKind,
    /// Vector dimension fixed at creation.
    pub dimension: usize,
    /// Whether the index can accept vectors (always true for flat kinds).
    pub trained: bool,
    /// Number of vectors added so far.
    pub vectors_total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_is_content_derived() {
        let a = Chunk::new("same text", "doc-a", 1, 0);
        let b = Chunk::new("same text", "doc-b", 7, 3);
        assert_eq!(a.content_hash, b.content_hash);

        let c = Chunk::new("other text", "doc-a", 1, 1);
        assert_ne!(a.content_hash, c.content_hash);
    }
}
