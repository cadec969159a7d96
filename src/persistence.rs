//! Durable persistence of the store as one artifact set.
//!
//! One base path names four sibling files versioned together:
//!
//! - `<base>` — the index itself, an rkyv binary blob
//! - `<base>.chunks.json` — chunk metadata in index offset order
//! - `<base>.hashes.json` — the dedup hash set
//! - `<base>.meta.json` — human-readable summary (kind, dimension, count)
//!
//! plus an optional `<base>.vectors.bin` raw dump of the vector matrix,
//! which lets the index be rebuilt with a different strategy without
//! re-embedding.
//!
//! A missing index blob fails the load. Missing sidecar files do not:
//! chunks fall back to empty and hashes are recomputed from whatever
//! chunks were read, each with a prominent warning, since their absence
//! after a successful save means tampering or a partial write.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rkyv::rancor::Error as RkyvError;
use rkyv::{from_bytes, to_bytes};
use tracing::{info, warn};

use crate::embedding::Embedder;
use crate::error::{PipelineError, Result};
use crate::index::{FlatIndex, IndexKind, IndexParams, IvfFlatIndex, IvfPqIndex, Metric, VectorIndex};
use crate::store::VectorStore;
use crate::types::{Chunk, IndexState};

/// The file paths making up one persisted index generation.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    base: PathBuf,
}

impl ArtifactSet {
    /// Creates the artifact set rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Path of the index blob.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.base
    }

    /// Path of the chunk metadata file.
    #[must_use]
    pub fn chunks_path(&self) -> PathBuf {
        self.sibling(".chunks.json")
    }

    /// Path of the dedup hash set file.
    #[must_use]
    pub fn hashes_path(&self) -> PathBuf {
        self.sibling(".hashes.json")
    }

    /// Path of the human-readable summary file.
    #[must_use]
    pub fn meta_path(&self) -> PathBuf {
        self.sibling(".meta.json")
    }

    /// Path of the optional raw vector matrix snapshot.
    #[must_use]
    pub fn vectors_path(&self) -> PathBuf {
        self.sibling(".vectors.bin")
    }

    /// Whether a previously saved index blob exists at this base.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.base.exists()
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.base.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }
}

#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
enum IndexBlob {
    FlatL2(FlatBlob),
    FlatIp(FlatBlob),
    IvfFlat(IvfFlatBlob),
    IvfPq(IvfPqBlob),
}

#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
struct FlatBlob {
    dim: u64,
    data: Vec<f32>,
}

#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
struct IvfFlatBlob {
    dim: u64,
    nlist: u64,
    nprobe: u64,
    centroids: Vec<f32>,
    lists: Vec<Vec<u64>>,
    data: Vec<f32>,
}

#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
struct IvfPqBlob {
    dim: u64,
    nlist: u64,
    nprobe: u64,
    m: u64,
    ksub: u64,
    coarse: Vec<f32>,
    codebooks: Vec<f32>,
    lists: Vec<Vec<u64>>,
    codes: Vec<u8>,
}

fn lists_to_blob(lists: &[Vec<usize>]) -> Vec<Vec<u64>> {
    lists
        .iter()
        .map(|l| l.iter().map(|&o| o as u64).collect())
        .collect()
}

fn lists_from_blob(lists: Vec<Vec<u64>>) -> Vec<Vec<usize>> {
    lists
        .into_iter()
        .map(|l| l.into_iter().map(|o| o as usize).collect())
        .collect()
}

impl From<&VectorIndex> for IndexBlob {
    fn from(index: &VectorIndex) -> Self {
        match index {
            VectorIndex::FlatL2(i) => Self::FlatL2(FlatBlob {
                dim: i.dim as u64,
                data: i.data.clone(),
            }),
            VectorIndex::FlatIp(i) => Self::FlatIp(FlatBlob {
                dim: i.dim as u64,
                data: i.data.clone(),
            }),
            VectorIndex::IvfFlat(i) => Self::IvfFlat(IvfFlatBlob {
                dim: i.dim as u64,
                nlist: i.nlist as u64,
                nprobe: i.nprobe as u64,
                centroids: i.centroids.clone(),
                lists: lists_to_blob(&i.lists),
                data: i.data.clone(),
            }),
            VectorIndex::IvfPq(i) => Self::IvfPq(IvfPqBlob {
                dim: i.dim as u64,
                nlist: i.nlist as u64,
                nprobe: i.nprobe as u64,
                m: i.m as u64,
                ksub: i.ksub as u64,
                coarse: i.coarse.clone(),
                codebooks: i.codebooks.clone(),
                lists: lists_to_blob(&i.lists),
                codes: i.codes.clone(),
            }),
        }
    }
}

impl IndexBlob {
    fn into_index(self) -> VectorIndex {
        match self {
            Self::FlatL2(b) => {
                let mut index = FlatIndex::new(Metric::L2, b.dim as usize);
                index.data = b.data;
                VectorIndex::FlatL2(index)
            }
            Self::FlatIp(b) => {
                let mut index = FlatIndex::new(Metric::Ip, b.dim as usize);
                index.data = b.data;
                VectorIndex::FlatIp(index)
            }
            Self::IvfFlat(b) => {
                let mut index =
                    IvfFlatIndex::new(b.dim as usize, b.nlist as usize, b.nprobe as usize);
                index.centroids = b.centroids;
                index.lists = lists_from_blob(b.lists);
                index.data = b.data;
                VectorIndex::IvfFlat(index)
            }
            Self::IvfPq(b) => {
                let mut index = IvfPqIndex::new(
                    b.dim as usize,
                    b.nlist as usize,
                    b.nprobe as usize,
                    b.m as usize,
                );
                index.ksub = b.ksub as usize;
                index.coarse = b.coarse;
                index.codebooks = b.codebooks;
                index.lists = lists_from_blob(b.lists);
                index.codes = b.codes;
                VectorIndex::IvfPq(index)
            }
        }
    }

    fn params(&self) -> IndexParams {
        match self {
            Self::FlatL2(_) | Self::FlatIp(_) => IndexParams::default(),
            Self::IvfFlat(b) => IndexParams {
                nlist: b.nlist as usize,
                nprobe: Some(b.nprobe as usize),
                ..IndexParams::default()
            },
            Self::IvfPq(b) => IndexParams {
                nlist: b.nlist as usize,
                pq_subspaces: b.m as usize,
                nprobe: Some(b.nprobe as usize),
            },
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes).map_err(|e| PipelineError::Persistence {
        path: path.to_path_buf(),
        source: e,
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| PipelineError::Persistence {
        path: path.to_path_buf(),
        source: e,
    })
}

fn save_vectors_snapshot(path: &Path, matrix: &[f32], dim: usize) -> Result<()> {
    let rows = if dim == 0 { 0 } else { matrix.len() / dim };
    let mut buf = Vec::with_capacity(16 + matrix.len() * 4);
    buf.extend_from_slice(&(rows as u64).to_le_bytes());
    buf.extend_from_slice(&(dim as u64).to_le_bytes());
    for x in matrix {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    write_file(path, &buf)
}

fn load_vectors_snapshot(path: &Path) -> Result<(Vec<f32>, usize)> {
    let bytes = read_file(path)?;
    let header_err = || PipelineError::Serialization(format!(
        "vector snapshot {} is truncated",
        path.display()
    ));
    let rows = u64::from_le_bytes(bytes.get(0..8).ok_or_else(header_err)?.try_into().map_err(|_| header_err())?) as usize;
    let dim = u64::from_le_bytes(bytes.get(8..16).ok_or_else(header_err)?.try_into().map_err(|_| header_err())?) as usize;
    let body = &bytes[16..];
    if body.len() != rows * dim * 4 {
        return Err(PipelineError::Serialization(format!(
            "vector snapshot {} declares {rows}x{dim} but holds {} bytes",
            path.display(),
            body.len()
        )));
    }
    let mut matrix = Vec::with_capacity(rows * dim);
    for chunk in body.chunks_exact(4) {
        let arr: [u8; 4] = chunk.try_into().map_err(|_| header_err())?;
        matrix.push(f32::from_le_bytes(arr));
    }
    Ok((matrix, dim))
}

pub(crate) fn save<E: Embedder>(store: &VectorStore<E>, set: &ArtifactSet, save_vectors: bool) -> Result<()> {
    let index = store.index.as_ref().ok_or_else(|| {
        PipelineError::State("cannot persist a store whose index was never built".into())
    })?;

    let blob = IndexBlob::from(index);
    let bytes = to_bytes::<RkyvError>(&blob)
        .map_err(|e| PipelineError::Serialization(e.to_string()))?;
    write_file(set.index_path(), &bytes)?;

    let chunks = serde_json::to_vec_pretty(&store.chunks)
        .map_err(|e| PipelineError::Serialization(e.to_string()))?;
    write_file(&set.chunks_path(), &chunks)?;

    let mut hashes: Vec<u64> = store.hashes.iter().copied().collect();
    hashes.sort_unstable();
    let hashes = serde_json::to_vec(&hashes)
        .map_err(|e| PipelineError::Serialization(e.to_string()))?;
    write_file(&set.hashes_path(), &hashes)?;

    let meta = serde_json::to_vec_pretty(&index.state())
        .map_err(|e| PipelineError::Serialization(e.to_string()))?;
    write_file(&set.meta_path(), &meta)?;

    if save_vectors {
        save_vectors_snapshot(&set.vectors_path(), &store.matrix, index.dim())?;
    }

    info!(
        base = %set.index_path().display(),
        vectors = index.len(),
        kind = %index.kind(),
        "saved index artifact set"
    );
    Ok(())
}

pub(crate) fn load<E: Embedder>(embedder: E, set: &ArtifactSet) -> Result<VectorStore<E>> {
    let index_path = set.index_path();
    let bytes = match fs::read(index_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PipelineError::Input(format!(
                "no index file at {}",
                index_path.display()
            )));
        }
        Err(e) => {
            return Err(PipelineError::Persistence {
                path: index_path.to_path_buf(),
                source: e,
            });
        }
    };
    let blob = from_bytes::<IndexBlob, RkyvError>(&bytes)
        .map_err(|e| PipelineError::Serialization(e.to_string()))?;
    let params = blob.params();
    let index = blob.into_index();

    let chunks: Vec<Chunk> = match fs::read(set.chunks_path()) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(
                path = %set.chunks_path().display(),
                "chunk metadata file missing, falling back to an empty chunk list; \
                 the index blob is present so this set was likely tampered with"
            );
            Vec::new()
        }
        Err(e) => {
            return Err(PipelineError::Persistence {
                path: set.chunks_path(),
                source: e,
            });
        }
    };

    let hashes: HashSet<u64> = match fs::read(set.hashes_path()) {
        Ok(bytes) => serde_json::from_slice::<Vec<u64>>(&bytes)
            .map_err(|e| PipelineError::Serialization(e.to_string()))?
            .into_iter()
            .collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(
                path = %set.hashes_path().display(),
                "hash set file missing, recomputing from loaded chunk metadata"
            );
            chunks.iter().map(|c| c.content_hash).collect()
        }
        Err(e) => {
            return Err(PipelineError::Persistence {
                path: set.hashes_path(),
                source: e,
            });
        }
    };

    if chunks.len() != index.len() {
        warn!(
            chunks = chunks.len(),
            vectors = index.len(),
            "chunk metadata and index vector counts disagree; \
             unmatched offsets will be dropped at search time"
        );
    }

    let vectors_path = set.vectors_path();
    let matrix = if vectors_path.exists() {
        load_vectors_snapshot(&vectors_path)?.0
    } else {
        match &index {
            VectorIndex::FlatL2(i) | VectorIndex::FlatIp(i) => i.data.clone(),
            VectorIndex::IvfFlat(i) => i.data.clone(),
            VectorIndex::IvfPq(_) => {
                warn!(
                    "no vector snapshot alongside a PQ index; rebuilding with a \
                     different strategy will require re-embedding"
                );
                Vec::new()
            }
        }
    };

    info!(
        base = %index_path.display(),
        vectors = index.len(),
        kind = %index.kind(),
        "loaded index artifact set"
    );
    Ok(VectorStore {
        embedder,
        kind: index.kind(),
        params,
        index: Some(index),
        chunks,
        hashes,
        matrix,
    })
}

impl<E: Embedder> VectorStore<E> {
    /// Persists the index, chunk metadata, hash set and summary as one
    /// artifact set rooted at `base`.
    pub fn save(&self, base: impl AsRef<Path>, save_vectors: bool) -> Result<()> {
        save(self, &ArtifactSet::new(base.as_ref()), save_vectors)
    }

    /// Loads a previously saved artifact set.
    ///
    /// Fails if the index blob is absent; missing sidecar files degrade to
    /// empty structures with a warning.
    pub fn load(embedder: E, base: impl AsRef<Path>) -> Result<Self> {
        load(embedder, &ArtifactSet::new(base.as_ref()))
    }

    /// Reads back the persisted human-readable summary, if present.
    pub fn read_summary(base: impl AsRef<Path>) -> Result<IndexState> {
        let set = ArtifactSet::new(base.as_ref());
        let bytes = read_file(&set.meta_path())?;
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::Serialization(e.to_string()))
    }
}
