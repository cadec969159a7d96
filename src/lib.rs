//! Document-to-vector-index pipeline for retrieval workloads.
//!
//! [`Pipeline`] glues any [`Embedder`] to a built-in multi-strategy vector
//! index, exposing a small API surface:
//! - [`Pipeline::ingest_directory`] – clean, chunk, deduplicate, embed and
//!   index documents.
//! - [`Pipeline::search`] – embed a query and fetch the best matching
//!   chunks with normalized scores.
//! - [`Pipeline::save`] / resume-on-construction – persist the index,
//!   chunk metadata and dedup hash set as one artifact set.
//!
//! Four index strategies are supported: exact L2 and inner-product flat
//! indexes, and trained IVF variants with optional product quantization
//! for large collections. The retained vector matrix can rebuild the index
//! under a different strategy without re-embedding.
//!
//! # Example
//!
//! ```no_run
//! use chunkdex::{Embedder, Pipeline, PipelineConfig};
//!
//! struct ZeroEmbedder;
//!
//! impl Embedder for ZeroEmbedder {
//!     fn dim(&self) -> usize {
//!         384
//!     }
//!
//!     fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
//!         Ok(texts.iter().map(|_| vec![0.0; 384]).collect())
//!     }
//! }
//!
//! fn main() -> chunkdex::Result<()> {
//!     let config = PipelineConfig::new("data/index");
//!     let mut pipeline = Pipeline::new(ZeroEmbedder, config)?;
//!     pipeline.ingest_directory("docs")?;
//!     for hit in pipeline.search("physical channel mapping", None)? {
//!         println!("{:.3}  [{}] {}", hit.score, hit.chunk.source_id, hit.chunk.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cleaning;
pub mod config;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
pub mod persistence;
pub mod pipeline;
pub mod score;
pub mod store;
pub mod types;

pub use chunking::{Chunker, RecursiveChunker};
pub use cleaning::{Cleaner, PageCleaner};
pub use config::{DedupPolicy, PipelineConfig};
pub use dedup::content_hash;
pub use embedding::Embedder;
pub use error::{PipelineError, Result};
pub use index::{IndexKind, IndexParams, VectorIndex};
pub use loader::{DocumentLoader, TextLoader};
pub use persistence::ArtifactSet;
pub use pipeline::{FileOutcome, IngestReport, IngestStage, Pipeline};
pub use score::ScoreMode;
pub use store::VectorStore;
pub use types::{Chunk, IndexState, PageDocument, SearchHit};
