//! Recursive text chunking with overlap.

use std::collections::VecDeque;

use tracing::debug;

/// Trait for text splitting strategies.
pub trait Chunker: Send + Sync {
    /// Splits cleaned text into ordered chunk texts.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Separator preference, coarsest first. The final fallback splits on
/// character boundaries.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splits text recursively, preferring the largest separator granularity
/// that keeps every fragment within `chunk_size`, then greedily merges
/// fragments into chunks that share `overlap` characters of trailing
/// context with their predecessor.
///
/// Chunks whose stripped length falls below `min_length` are dropped.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveChunker {
    chunk_size: usize,
    overlap: usize,
    min_length: usize,
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(800, 160, 50)
    }
}

impl RecursiveChunker {
    /// Creates a chunker with the given size, overlap and minimum length,
    /// all in bytes of (ASCII) cleaned text.
    #[must_use]
    pub const fn new(chunk_size: usize, overlap: usize, min_length: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            min_length,
        }
    }

    /// Breaks `text` into fragments no longer than `chunk_size` whose
    /// concatenation reproduces `text` exactly.
    fn fragments<'a>(&self, text: &'a str, separators: &[&str], out: &mut Vec<&'a str>) {
        if text.is_empty() {
            return;
        }
        if text.len() <= self.chunk_size {
            out.push(text);
            return;
        }
        if let Some((sep, rest)) = separators.split_first() {
            for piece in text.split_inclusive(*sep) {
                self.fragments(piece, rest, out);
            }
        } else {
            // Character fallback for separator-free runs. Single-character
            // fragments keep the overlap carry exact.
            out.extend(text.split_inclusive(|_: char| true));
        }
    }

    /// Greedy merge: accumulate fragments up to `chunk_size`, emit, then
    /// seed the next chunk with up to `overlap` trailing bytes of context.
    fn merge(&self, fragments: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut window_len = 0usize;

        for &piece in fragments {
            if window_len + piece.len() > self.chunk_size && !window.is_empty() {
                chunks.push(window.iter().copied().collect::<String>());
                while window_len > self.overlap
                    || (window_len > 0 && window_len + piece.len() > self.chunk_size)
                {
                    match window.pop_front() {
                        Some(front) => window_len -= front.len(),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            window_len += piece.len();
        }
        if !window.is_empty() {
            chunks.push(window.iter().copied().collect::<String>());
        }
        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<String> {
        let mut fragments = Vec::new();
        self.fragments(text, &SEPARATORS, &mut fragments);
        let merged = self.merge(&fragments);

        let total = merged.len();
        let chunks: Vec<String> = merged
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| c.len() >= self.min_length)
            .collect();
        if chunks.len() < total {
            debug!(
                dropped = total - chunks.len(),
                min_length = self.min_length,
                "dropped short chunks"
            );
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = RecursiveChunker::new(800, 160, 1);
        assert_eq!(chunker.split("hello world"), vec!["hello world"]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = RecursiveChunker::default();
        assert!(chunker.split("").is_empty());
        assert!(chunker.split("   \n ").is_empty());
    }

    #[test]
    fn separator_free_text_overlaps_by_exactly_overlap_bytes() {
        let text: String = (0..1000).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let chunker = RecursiveChunker::new(800, 160, 50);
        let chunks = chunker.split(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 800);
        assert_eq!(chunks[1].len(), 360);
        // Shared context, and lossless reconstruction once it is removed.
        assert_eq!(chunks[0][640..], chunks[1][..160]);
        assert_eq!(format!("{}{}", chunks[0], &chunks[1][160..]), text);
    }

    #[test]
    fn prefers_paragraph_breaks_over_mid_word_splits() {
        let chunker = RecursiveChunker::new(10, 4, 1);
        let chunks = chunker.split("aaaa\n\nbbbb\n\ncccc");
        assert_eq!(chunks, vec!["aaaa", "bbbb\n\ncccc"]);
    }

    #[test]
    fn splits_on_spaces_with_word_level_overlap() {
        let chunker = RecursiveChunker::new(10, 4, 1);
        let chunks = chunker.split("one two three four five");
        assert_eq!(chunks, vec!["one two", "two three", "four five"]);
    }

    #[test]
    fn drops_chunks_below_min_length() {
        let chunker = RecursiveChunker::new(10, 0, 6);
        let chunks = chunker.split("tiny\n\nlong enough text here");
        assert!(chunks.iter().all(|c| c.len() >= 6), "{chunks:?}");
        assert!(!chunks.iter().any(|c| c == "tiny"));
    }

    #[test]
    fn no_chunk_exceeds_chunk_size() {
        let text = "word ".repeat(500);
        let chunker = RecursiveChunker::new(64, 16, 1);
        for chunk in chunker.split(&text) {
            assert!(chunk.len() <= 64, "{} bytes: {chunk:?}", chunk.len());
        }
    }
}
