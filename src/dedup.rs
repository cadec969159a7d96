//! Content deduplication using xxhash.

use xxhash_rust::xxh3::xxh3_64;

/// Computes the deduplication key for a chunk.
///
/// Hashed over the exact post-cleaning, post-chunking text that will be
/// embedded.
#[must_use]
pub fn content_hash(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}
