//! Document ingestion pipeline.
//!
//! [`Pipeline`] wires the loader, cleaner, chunker, deduplicator, embedder
//! and vector store together: documents flow clean → chunk → dedup →
//! embed → index, and queries flow embed → search → score.
//!
//! Ingestion is resilient per file: a failing document is logged and
//! skipped, the rest of the batch continues.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::cleaning::{Cleaner, PageCleaner};
use crate::config::{DedupPolicy, PipelineConfig};
use crate::dedup;
use crate::embedding::Embedder;
use crate::error::{PipelineError, Result};
use crate::index::{IndexKind, IndexParams};
use crate::loader::{DocumentLoader, TextLoader};
use crate::persistence::ArtifactSet;
use crate::store::VectorStore;
use crate::types::{Chunk, IndexState, SearchHit};

/// Where a document currently is in the ingestion flow, for progress
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    /// Enumerating candidate files in the source directory.
    Scanning,
    /// Reading pages out of the file.
    Loading,
    /// Cleaning page text and splitting it into chunks.
    Chunking,
    /// Embedding accepted chunk texts in batches.
    Embedding,
    /// Appending vectors and metadata to the store.
    Indexing,
    /// Persisting the artifact set.
    Saving,
    /// The file was fully ingested.
    Done,
    /// The file was skipped (unsupported, empty, duplicate or failed).
    Skipped,
}

/// Outcome of ingesting one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Chunks were embedded and indexed.
    Indexed {
        /// Chunks appended to the store.
        chunks: usize,
        /// Duplicate chunks dropped on the way.
        duplicates: usize,
    },
    /// Every chunk was a duplicate, or the dedup policy aborted the file.
    Duplicate,
    /// Cleaning left no usable text.
    Empty,
}

/// Aggregate counters for one directory ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files that contributed at least one chunk.
    pub files_indexed: usize,
    /// Files skipped: unsupported format, empty after cleaning, or
    /// duplicates.
    pub files_skipped: usize,
    /// Files that errored; the error was logged and the batch continued.
    pub files_failed: usize,
    /// Chunks appended to the store.
    pub chunks_added: usize,
    /// Duplicate chunks dropped.
    pub chunks_deduplicated: usize,
}

/// End-to-end ingestion and search over one vector store.
///
/// Generic over the embedder and, with defaults, the loader, cleaner and
/// chunker. Construction resumes from a previously persisted artifact set
/// when one exists at the configured index path.
pub struct Pipeline<E, L = TextLoader, C = PageCleaner, K = RecursiveChunker> {
    config: PipelineConfig,
    store: VectorStore<E>,
    loader: L,
    cleaner: C,
    chunker: K,
}

impl<E, L, C, K> fmt::Debug for Pipeline<E, L, C, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("index_path", &self.config.index_path)
            .field("chunks", &self.store.len())
            .finish_non_exhaustive()
    }
}

impl<E: Embedder> Pipeline<E> {
    /// Creates a pipeline with the default loader, cleaner and chunker.
    ///
    /// Loads the artifact set at `config.index_path` if one was saved
    /// before, otherwise starts empty.
    pub fn new(embedder: E, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let chunker = RecursiveChunker::new(
            config.chunk_size,
            config.chunk_overlap,
            config.min_chunk_length,
        );
        let set = ArtifactSet::new(&config.index_path);
        let store = if set.exists() {
            VectorStore::load(embedder, &config.index_path)?
        } else {
            VectorStore::new(embedder, config.index_kind, config.index_params)
        };
        Ok(Self {
            config,
            store,
            loader: TextLoader,
            cleaner: PageCleaner,
            chunker,
        })
    }
}

impl<E, L, C, K> Pipeline<E, L, C, K>
where
    E: Embedder,
    L: DocumentLoader,
    C: Cleaner,
    K: Chunker,
{
    /// Swaps in a different document loader.
    #[must_use]
    pub fn with_loader<L2: DocumentLoader>(self, loader: L2) -> Pipeline<E, L2, C, K> {
        Pipeline {
            config: self.config,
            store: self.store,
            loader,
            cleaner: self.cleaner,
            chunker: self.chunker,
        }
    }

    /// Swaps in a different cleaner.
    #[must_use]
    pub fn with_cleaner<C2: Cleaner>(self, cleaner: C2) -> Pipeline<E, L, C2, K> {
        Pipeline {
            config: self.config,
            store: self.store,
            loader: self.loader,
            cleaner,
            chunker: self.chunker,
        }
    }

    /// Swaps in a different chunker, overriding the configured chunk
    /// geometry.
    #[must_use]
    pub fn with_chunker<K2: Chunker>(self, chunker: K2) -> Pipeline<E, L, C, K2> {
        Pipeline {
            config: self.config,
            store: self.store,
            loader: self.loader,
            cleaner: self.cleaner,
            chunker,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &VectorStore<E> {
        &self.store
    }

    /// Observable index state, once the index exists.
    #[must_use]
    pub fn state(&self) -> Option<IndexState> {
        self.store.state()
    }

    /// Ingests every supported file under `dir`, descending into
    /// subdirectories, continuing past per-file failures.
    pub fn ingest_directory(&mut self, dir: impl AsRef<Path>) -> Result<IngestReport> {
        self.ingest_directory_with_progress(dir, |_, _| {})
    }

    /// Like [`Self::ingest_directory`], reporting per-file stages through
    /// `progress`.
    pub fn ingest_directory_with_progress(
        &mut self,
        dir: impl AsRef<Path>,
        mut progress: impl FnMut(&Path, IngestStage),
    ) -> Result<IngestReport> {
        let dir = dir.as_ref();
        progress(dir, IngestStage::Scanning);

        let mut report = IngestReport::default();
        let mut files: Vec<PathBuf> = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) if current != dir => {
                    warn!(path = %current.display(), error = %e, "unreadable directory, skipping");
                    report.files_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.is_file() {
                    files.push(path);
                }
            }
        }
        files.sort();

        let mut supported = Vec::with_capacity(files.len());
        for path in files {
            if self.loader.supports(&path) {
                supported.push(path);
            } else {
                debug!(path = %path.display(), "unsupported format, skipping file");
                report.files_skipped += 1;
                progress(&path, IngestStage::Skipped);
            }
        }
        if supported.is_empty() {
            return Err(PipelineError::Input(format!(
                "no supported documents under {}",
                dir.display()
            )));
        }

        for path in supported {
            match self.ingest_file_inner(&path, &mut progress) {
                Ok(FileOutcome::Indexed { chunks, duplicates }) => {
                    report.files_indexed += 1;
                    report.chunks_added += chunks;
                    report.chunks_deduplicated += duplicates;
                    progress(&path, IngestStage::Done);
                }
                Ok(FileOutcome::Duplicate | FileOutcome::Empty) => {
                    report.files_skipped += 1;
                    progress(&path, IngestStage::Skipped);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to ingest document, continuing");
                    report.files_failed += 1;
                    progress(&path, IngestStage::Skipped);
                }
            }
        }
        info!(
            indexed = report.files_indexed,
            skipped = report.files_skipped,
            failed = report.files_failed,
            chunks = report.chunks_added,
            deduplicated = report.chunks_deduplicated,
            "directory ingestion finished"
        );
        Ok(report)
    }

    /// Ingests a single file.
    pub fn ingest_file(&mut self, path: impl AsRef<Path>) -> Result<FileOutcome> {
        self.ingest_file_inner(path.as_ref(), &mut |_, _| {})
    }

    fn ingest_file_inner(
        &mut self,
        path: &Path,
        progress: &mut dyn FnMut(&Path, IngestStage),
    ) -> Result<FileOutcome> {
        progress(path, IngestStage::Loading);
        let pages = self.loader.load(path)?;
        let source_id = pages
            .first()
            .map(|p| p.source_id.clone())
            .unwrap_or_default();

        progress(path, IngestStage::Chunking);
        let mut texts: Vec<(u32, String)> = Vec::new();
        for page in &pages {
            let cleaned = self.cleaner.clean(&page.content, page.page_number);
            if cleaned.is_empty() {
                continue;
            }
            for chunk_text in self.chunker.split(&cleaned) {
                texts.push((page.page_number, chunk_text));
            }
        }
        if texts.is_empty() {
            debug!(source = %source_id, "no chunks survived cleaning");
            return Ok(FileOutcome::Empty);
        }

        // Dedup before anything is embedded or appended, so an aborted
        // document leaves no trace in the store.
        let mut batch_hashes = HashSet::new();
        let mut accepted: Vec<(u32, String)> = Vec::new();
        let mut duplicates = 0usize;
        for (page_number, text) in texts {
            let hash = dedup::content_hash(&text);
            if self.store.contains_hash(hash) || !batch_hashes.insert(hash) {
                duplicates += 1;
                match self.config.dedup_policy {
                    DedupPolicy::SkipDocument => {
                        info!(source = %source_id, "duplicate chunk, skipping whole document");
                        return Ok(FileOutcome::Duplicate);
                    }
                    DedupPolicy::SkipChunk => continue,
                }
            }
            accepted.push((page_number, text));
        }
        if accepted.is_empty() {
            info!(source = %source_id, duplicates, "every chunk was a duplicate");
            return Ok(FileOutcome::Duplicate);
        }

        let chunks: Vec<Chunk> = accepted
            .into_iter()
            .enumerate()
            .map(|(i, (page_number, text))| Chunk::new(text, source_id.clone(), page_number, i))
            .collect();

        progress(path, IngestStage::Embedding);
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.batch_size) {
            let batch_texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embedded = self
                .store
                .embedder()
                .embed_batch(&batch_texts)
                .map_err(PipelineError::Embedding)?;
            if embedded.len() != batch_texts.len() {
                return Err(PipelineError::Input(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    batch_texts.len()
                )));
            }
            vectors.extend(embedded);
        }

        progress(path, IngestStage::Indexing);
        let added = self.store.add_chunks(chunks, vectors)?;
        info!(source = %source_id, chunks = added, duplicates, "indexed document");

        if self.config.auto_save {
            progress(path, IngestStage::Saving);
            self.save()?;
        }
        Ok(FileOutcome::Indexed {
            chunks: added,
            duplicates,
        })
    }

    /// Searches with the configured score mode and score floor.
    ///
    /// `top_k` falls back to the configured default when `None`.
    pub fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchHit>> {
        let k = top_k.unwrap_or(self.config.default_top_k);
        self.store
            .search(query, k, self.config.score_mode, self.config.min_score)
    }

    /// Persists the artifact set at the configured index path.
    pub fn save(&self) -> Result<()> {
        self.store
            .save(&self.config.index_path, self.config.save_vectors)
    }

    /// Rebuilds the index with a different strategy from the retained
    /// vectors, then persists if auto-save is on.
    pub fn rebuild_index(&mut self, kind: IndexKind, params: IndexParams) -> Result<()> {
        self.store.rebuild_index(kind, params)?;
        if self.config.auto_save {
            self.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::embedding::testing::HashEmbedder;

    fn para(word: &str) -> String {
        format!(
            "the {word} colored boat drifted past the quiet harbor while gulls circled overhead slowly"
        )
    }

    fn test_config(dir: &Path) -> PipelineConfig {
        PipelineConfig::new(dir.join("store").join("index"))
            .with_chunk_size(120)
            .with_chunk_overlap(20)
            .with_min_chunk_length(10)
            .with_batch_size(4)
    }

    fn pipeline(config: PipelineConfig) -> Pipeline<HashEmbedder> {
        Pipeline::new(HashEmbedder::new(16), config).unwrap()
    }

    /// Two documents, two paragraph chunks each.
    fn seed_docs(dir: &TempDir) -> PathBuf {
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(
            docs.join("a.txt"),
            format!("{}\n\n{}", para("amber"), para("violet")),
        )
        .unwrap();
        fs::write(
            docs.join("b.txt"),
            format!("{}\n\n{}", para("crimson"), para("golden")),
        )
        .unwrap();
        docs
    }

    #[test]
    fn ingests_and_searches_a_directory() {
        let dir = tempdir().unwrap();
        let docs = seed_docs(&dir);
        let mut pipeline = pipeline(test_config(dir.path()));

        let report = pipeline.ingest_directory(&docs).unwrap();
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.files_failed, 0);
        assert_eq!(report.chunks_added, 4);
        assert_eq!(pipeline.store().len(), 4);

        let hits = pipeline.search(&para("crimson"), Some(1)).unwrap();
        assert_eq!(hits[0].chunk.source_id, "b.txt");
        assert_eq!(hits[0].chunk.text, para("crimson"));
    }

    #[test]
    fn ingests_files_in_nested_subdirectories() {
        let dir = tempdir().unwrap();
        let docs = seed_docs(&dir);
        let sub = docs.join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("nested.txt"), para("indigo")).unwrap();

        let mut pipeline = pipeline(test_config(dir.path()));
        let report = pipeline.ingest_directory(&docs).unwrap();
        assert_eq!(report.files_indexed, 3);
        assert_eq!(report.files_skipped, 0);

        let hits = pipeline.search(&para("indigo"), Some(1)).unwrap();
        assert_eq!(hits[0].chunk.source_id, "nested.txt");
    }

    #[test]
    fn debug_output_reports_chunk_count() {
        let dir = tempdir().unwrap();
        let docs = seed_docs(&dir);
        let mut pipeline = pipeline(test_config(dir.path()));
        pipeline.ingest_directory(&docs).unwrap();

        let rendered = format!("{pipeline:?}");
        assert!(rendered.contains("chunks: 4"), "{rendered}");
    }

    #[test]
    fn chunk_indices_are_dense_per_document() {
        let dir = tempdir().unwrap();
        let docs = seed_docs(&dir);
        let mut pipeline = pipeline(test_config(dir.path()));
        pipeline.ingest_directory(&docs).unwrap();

        let mut indices: Vec<usize> = pipeline
            .store()
            .chunks()
            .iter()
            .filter(|c| c.source_id == "a.txt")
            .map(|c| c.chunk_index)
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn reingesting_adds_nothing() {
        let dir = tempdir().unwrap();
        let docs = seed_docs(&dir);
        let mut pipeline = pipeline(test_config(dir.path()));
        pipeline.ingest_directory(&docs).unwrap();

        let report = pipeline.ingest_directory(&docs).unwrap();
        assert_eq!(report.chunks_added, 0);
        assert_eq!(report.files_indexed, 0);
        assert_eq!(report.files_skipped, 2);
        assert_eq!(pipeline.store().len(), 4);
    }

    #[test]
    fn skip_chunk_policy_keeps_the_rest_of_the_document() {
        let dir = tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(
            docs.join("a.txt"),
            format!("{}\n\n{}", para("shared"), para("first")),
        )
        .unwrap();
        fs::write(
            docs.join("c.txt"),
            format!("{}\n\n{}", para("shared"), para("second")),
        )
        .unwrap();

        let mut pipeline = pipeline(test_config(dir.path()));
        let report = pipeline.ingest_directory(&docs).unwrap();
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.chunks_added, 3);
        assert_eq!(report.chunks_deduplicated, 1);
        assert!(pipeline.search(&para("second"), Some(1)).unwrap()[0]
            .chunk
            .text
            .contains("second"));
    }

    #[test]
    fn skip_document_policy_aborts_the_whole_file() {
        let dir = tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(
            docs.join("a.txt"),
            format!("{}\n\n{}", para("shared"), para("first")),
        )
        .unwrap();
        fs::write(
            docs.join("c.txt"),
            format!("{}\n\n{}", para("shared"), para("second")),
        )
        .unwrap();

        let config = test_config(dir.path()).with_dedup_policy(DedupPolicy::SkipDocument);
        let mut pipeline = pipeline(config);
        let report = pipeline.ingest_directory(&docs).unwrap();
        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(pipeline.store().len(), 2);
        assert!(pipeline
            .store()
            .chunks()
            .iter()
            .all(|c| c.source_id == "a.txt"));
    }

    #[test]
    fn unsupported_and_empty_files_are_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("a.txt"), para("amber")).unwrap();
        fs::write(docs.join("blob.bin"), [0u8, 1, 2]).unwrap();
        fs::write(docs.join("empty.txt"), "42\n").unwrap();

        let mut pipeline = pipeline(test_config(dir.path()));
        let report = pipeline.ingest_directory(&docs).unwrap();
        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.files_skipped, 2);
        assert_eq!(report.files_failed, 0);
    }

    #[test]
    fn per_file_failures_do_not_abort_the_batch() {
        let dir = tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("a.txt"), para("amber")).unwrap();
        // Invalid UTF-8 makes the loader fail on this file only.
        fs::write(docs.join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();

        let mut pipeline = pipeline(test_config(dir.path()));
        let report = pipeline.ingest_directory(&docs).unwrap();
        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.files_failed, 1);
    }

    #[test]
    fn directory_without_supported_documents_is_an_input_error() {
        let dir = tempdir().unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("blob.bin"), [0u8]).unwrap();

        let mut pipeline = pipeline(test_config(dir.path()));
        assert!(matches!(
            pipeline.ingest_directory(&docs),
            Err(PipelineError::Input(_))
        ));
    }

    #[test]
    fn resumes_from_a_persisted_artifact_set() {
        let dir = tempdir().unwrap();
        let docs = seed_docs(&dir);
        let config = test_config(dir.path());
        {
            let mut pipeline = pipeline(config.clone());
            pipeline.ingest_directory(&docs).unwrap();
        }

        let mut resumed = pipeline(config);
        assert_eq!(resumed.store().len(), 4);
        let report = resumed.ingest_directory(&docs).unwrap();
        assert_eq!(report.chunks_added, 0);
        let hits = resumed.search(&para("violet"), Some(1)).unwrap();
        assert_eq!(hits[0].chunk.source_id, "a.txt");
    }

    #[test]
    fn progress_reports_stages_in_order() {
        let dir = tempdir().unwrap();
        let docs = seed_docs(&dir);
        let mut pipeline = pipeline(test_config(dir.path()));

        let mut stages = Vec::new();
        pipeline
            .ingest_directory_with_progress(&docs, |_, stage| stages.push(stage))
            .unwrap();
        assert_eq!(stages.first(), Some(&IngestStage::Scanning));
        let per_file: Vec<_> = stages
            .iter()
            .filter(|s| {
                matches!(
                    s,
                    IngestStage::Loading | IngestStage::Indexing | IngestStage::Done
                )
            })
            .collect();
        assert_eq!(per_file.len(), 6);
        assert_eq!(stages.last(), Some(&IngestStage::Done));
    }

    #[test]
    fn rebuild_switches_kind_and_persists() {
        let dir = tempdir().unwrap();
        let docs = seed_docs(&dir);
        let config = test_config(dir.path());
        let mut pipeline = pipeline(config.clone());
        pipeline.ingest_directory(&docs).unwrap();

        pipeline
            .rebuild_index(IndexKind::FlatIp, IndexParams::default())
            .unwrap();
        assert_eq!(pipeline.state().unwrap().kind, IndexKind::FlatIp);

        let resumed = Pipeline::new(HashEmbedder::new(16), config).unwrap();
        assert_eq!(resumed.state().unwrap().kind, IndexKind::FlatIp);
    }
}
