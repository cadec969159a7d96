//! Vector index engine.
//!
//! One closed enum, [`VectorIndex`], dispatches over the supported index
//! strategies. Flat variants are exact and need no training; IVF variants
//! cluster vectors into inverted lists and must be trained on a
//! representative sample before the first `add`.

mod flat;
mod ivf;
mod kmeans;
mod pq;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use self::flat::FlatIndex;
pub(crate) use self::flat::Metric;
pub use self::ivf::IvfFlatIndex;
pub use self::pq::IvfPqIndex;
use crate::error::{PipelineError, Result};
use crate::types::IndexState;

/// Index strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact search, squared Euclidean distance, ascending.
    #[default]
    FlatL2,
    /// Exact search, inner product, descending. Callers must supply
    /// unit-normalized vectors for cosine semantics.
    FlatIp,
    /// Inverted-list clustering over full vectors.
    IvfFlat,
    /// Inverted-list clustering with product quantization, 8-bit codes.
    IvfPq,
}

impl IndexKind {
    /// Whether this kind must be trained before vectors can be added.
    #[must_use]
    pub const fn requires_training(self) -> bool {
        matches!(self, Self::IvfFlat | Self::IvfPq)
    }

    /// Canonical configuration-file spelling of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FlatL2 => "flat_l2",
            Self::FlatIp => "flat_ip",
            Self::IvfFlat => "ivf_flat",
            Self::IvfPq => "ivf_pq",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flat_l2" | "flatl2" | "l2" => Ok(Self::FlatL2),
            "flat_ip" | "flatip" | "ip" => Ok(Self::FlatIp),
            "ivf_flat" | "ivfflat" | "ivf" => Ok(Self::IvfFlat),
            "ivf_pq" | "ivfpq" => Ok(Self::IvfPq),
            other => Err(PipelineError::Config(format!(
                "unknown index kind `{other}` (expected flat_l2, flat_ip, ivf_flat or ivf_pq)"
            ))),
        }
    }
}

/// Tuning parameters for IVF variants. Ignored by flat indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    /// Number of inverted-list clusters.
    pub nlist: usize,
    /// Number of product-quantization sub-spaces (IVFPQ only). Must divide
    /// the vector dimension.
    pub pq_subspaces: usize,
    /// Clusters probed per query. Defaults to `min(10, nlist / 10)`,
    /// floored at one.
    pub nprobe: Option<usize>,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            nlist: 100,
            pq_subspaces: 64,
            nprobe: None,
        }
    }
}

impl IndexParams {
    /// Resolves the probe count heuristic.
    #[must_use]
    pub fn effective_nprobe(&self) -> usize {
        match self.nprobe {
            Some(n) => n.max(1),
            None => (self.nlist / 10).clamp(1, 10),
        }
    }
}

pub(crate) fn l2_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// A vector index of one of the supported kinds.
///
/// All vectors share the dimension fixed at construction. `add` only ever
/// appends; removal means rebuilding from retained vectors.
#[derive(Debug)]
pub enum VectorIndex {
    /// Exact L2 index.
    FlatL2(FlatIndex),
    /// Exact inner-product index.
    FlatIp(FlatIndex),
    /// Trained inverted-list index over full vectors.
    IvfFlat(IvfFlatIndex),
    /// Trained inverted-list index over quantized codes.
    IvfPq(IvfPqIndex),
}

impl VectorIndex {
    /// Creates an empty index of the given kind and dimension.
    ///
    /// IVF variants start untrained and reject `add` until [`Self::train`]
    /// succeeds.
    pub fn new(kind: IndexKind, dim: usize, params: &IndexParams) -> Result<Self> {
        if dim == 0 {
            return Err(PipelineError::Config(
                "vector dimension must be non-zero".into(),
            ));
        }
        match kind {
            IndexKind::FlatL2 => Ok(Self::FlatL2(FlatIndex::new(Metric::L2, dim))),
            IndexKind::FlatIp => Ok(Self::FlatIp(FlatIndex::new(Metric::Ip, dim))),
            IndexKind::IvfFlat => {
                validate_nlist(params.nlist)?;
                Ok(Self::IvfFlat(IvfFlatIndex::new(
                    dim,
                    params.nlist,
                    params.effective_nprobe(),
                )))
            }
            IndexKind::IvfPq => {
                validate_nlist(params.nlist)?;
                if params.pq_subspaces == 0 || dim % params.pq_subspaces != 0 {
                    return Err(PipelineError::Config(format!(
                        "pq_subspaces {} must be non-zero and divide dimension {dim}",
                        params.pq_subspaces
                    )));
                }
                Ok(Self::IvfPq(IvfPqIndex::new(
                    dim,
                    params.nlist,
                    params.effective_nprobe(),
                    params.pq_subspaces,
                )))
            }
        }
    }

    /// Builds an index from a first batch of vectors: derives the dimension
    /// from the batch, trains IVF variants on it, then adds every vector.
    pub fn build(kind: IndexKind, params: &IndexParams, vectors: &[Vec<f32>]) -> Result<Self> {
        let dim = vectors
            .first()
            .map(Vec::len)
            .ok_or_else(|| PipelineError::Input("cannot build an index from an empty batch".into()))?;
        let mut index = Self::new(kind, dim, params)?;
        if kind.requires_training() {
            index.train(vectors)?;
        }
        index.add(vectors)?;
        Ok(index)
    }

    /// Index kind tag.
    #[must_use]
    pub fn kind(&self) -> IndexKind {
        match self {
            Self::FlatL2(_) => IndexKind::FlatL2,
            Self::FlatIp(_) => IndexKind::FlatIp,
            Self::IvfFlat(_) => IndexKind::IvfFlat,
            Self::IvfPq(_) => IndexKind::IvfPq,
        }
    }

    /// Fixed vector dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        match self {
            Self::FlatL2(i) | Self::FlatIp(i) => i.dim,
            Self::IvfFlat(i) => i.dim,
            Self::IvfPq(i) => i.dim,
        }
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::FlatL2(i) | Self::FlatIp(i) => i.len(),
            Self::IvfFlat(i) => i.len(),
            Self::IvfPq(i) => i.len(),
        }
    }

    /// Whether no vectors have been added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the index is ready to accept vectors. Always true for flat
    /// kinds.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        match self {
            Self::FlatL2(_) | Self::FlatIp(_) => true,
            Self::IvfFlat(i) => i.is_trained(),
            Self::IvfPq(i) => i.is_trained(),
        }
    }

    /// Trains IVF variants on a representative sample. A no-op for flat
    /// kinds.
    ///
    /// Fails with a configuration error when the sample is smaller than the
    /// cluster count, and with a state error when vectors were already
    /// added.
    pub fn train(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let nlist = match self {
            Self::FlatL2(_) | Self::FlatIp(_) => return Ok(()),
            Self::IvfFlat(i) => i.nlist,
            Self::IvfPq(i) => i.nlist,
        };
        if !self.is_empty() {
            return Err(PipelineError::State(
                "cannot retrain an index that already holds vectors".into(),
            ));
        }
        self.check_dims(vectors)?;
        if vectors.len() < nlist {
            return Err(PipelineError::Config(format!(
                "training sample of {} vectors is smaller than nlist {nlist}",
                vectors.len()
            )));
        }
        match self {
            Self::IvfFlat(i) => i.train(vectors),
            Self::IvfPq(i) => i.train(vectors),
            Self::FlatL2(_) | Self::FlatIp(_) => {}
        }
        Ok(())
    }

    /// Appends vectors. Every vector must match the index dimension; on any
    /// mismatch nothing is added.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if !self.is_trained() {
            return Err(PipelineError::State(
                "index must be trained before vectors are added".into(),
            ));
        }
        self.check_dims(vectors)?;
        match self {
            Self::FlatL2(i) | Self::FlatIp(i) => i.add(vectors),
            Self::IvfFlat(i) => i.add(vectors),
            Self::IvfPq(i) => i.add(vectors),
        }
        Ok(())
    }

    /// Returns up to `k` `(offset, distance)` pairs, best match first.
    ///
    /// For L2 kinds distance is squared Euclidean, ascending; for the
    /// inner-product kind distance is the raw inner product, descending.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if !self.is_trained() {
            return Err(PipelineError::State(
                "index must be trained before it can be searched".into(),
            ));
        }
        if query.len() != self.dim() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dim(),
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        Ok(match self {
            Self::FlatL2(i) | Self::FlatIp(i) => i.search(query, k),
            Self::IvfFlat(i) => i.search(query, k),
            Self::IvfPq(i) => i.search(query, k),
        })
    }

    /// Snapshot of the observable index state.
    #[must_use]
    pub fn state(&self) -> IndexState {
        IndexState {
            kind: self.kind(),
            dimension: self.dim(),
            trained: self.is_trained(),
            vectors_total: self.len(),
        }
    }

    fn check_dims(&self, vectors: &[Vec<f32>]) -> Result<()> {
        let dim = self.dim();
        for v in vectors {
            if v.len() != dim {
                return Err(PipelineError::DimensionMismatch {
                    expected: dim,
                    actual: v.len(),
                });
            }
        }
        Ok(())
    }
}

fn validate_nlist(nlist: usize) -> Result<()> {
    if nlist == 0 {
        return Err(PipelineError::Config("nlist must be non-zero".into()));
    }
    Ok(())
}
