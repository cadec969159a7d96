//! Exact brute-force index.

use ordered_float::OrderedFloat;
use rayon::prelude::*;

use super::{dot, l2_sq};

/// Distance metric for [`FlatIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Metric {
    /// Squared Euclidean distance, smaller is better.
    L2,
    /// Inner product, larger is better.
    Ip,
}

/// Exact index: a flat row-major matrix scanned in full per query.
#[derive(Debug)]
pub struct FlatIndex {
    pub(crate) metric: Metric,
    pub(crate) dim: usize,
    pub(crate) data: Vec<f32>,
}

impl FlatIndex {
    pub(crate) fn new(metric: Metric, dim: usize) -> Self {
        Self {
            metric,
            dim,
            data: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub(crate) fn add(&mut self, vectors: &[Vec<f32>]) {
        for v in vectors {
            self.data.extend_from_slice(v);
        }
    }

    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .data
            .par_chunks_exact(self.dim)
            .enumerate()
            .map(|(offset, row)| {
                let d = match self.metric {
                    Metric::L2 => l2_sq(query, row),
                    Metric::Ip => dot(query, row),
                };
                (offset, d)
            })
            .collect();
        match self.metric {
            Metric::L2 => scored.sort_unstable_by_key(|&(_, d)| OrderedFloat(d)),
            Metric::Ip => scored.sort_unstable_by_key(|&(_, d)| std::cmp::Reverse(OrderedFloat(d))),
        }
        scored.truncate(k);
        scored
    }
}
