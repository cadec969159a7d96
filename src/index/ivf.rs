//! Inverted-list index over full vectors.

use ordered_float::OrderedFloat;

use super::{kmeans, l2_sq};

/// IVF index storing full vectors per inverted list.
///
/// Search ranks the trained coarse centroids against the query, scans the
/// `nprobe` closest lists exactly, and returns squared L2 distances.
#[derive(Debug)]
pub struct IvfFlatIndex {
    pub(crate) dim: usize,
    pub(crate) nlist: usize,
    pub(crate) nprobe: usize,
    /// Coarse centroids, row-major. Empty until trained.
    pub(crate) centroids: Vec<f32>,
    /// Global vector offsets per inverted list.
    pub(crate) lists: Vec<Vec<usize>>,
    /// All added vectors, row-major, in append order.
    pub(crate) data: Vec<f32>,
}

impl IvfFlatIndex {
    pub(crate) fn new(dim: usize, nlist: usize, nprobe: usize) -> Self {
        Self {
            dim,
            nlist,
            nprobe,
            centroids: Vec::new(),
            lists: Vec::new(),
            data: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub(crate) fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Callers ensure dimensions match and the sample is at least `nlist`
    /// rows.
    pub(crate) fn train(&mut self, vectors: &[Vec<f32>]) {
        let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
        self.centroids = kmeans::run(&flat, self.dim, self.nlist);
        self.lists = vec![Vec::new(); self.nlist];
    }

    pub(crate) fn add(&mut self, vectors: &[Vec<f32>]) {
        for v in vectors {
            let offset = self.len();
            let (list, _) = kmeans::nearest(&self.centroids, self.dim, v);
            self.lists[list].push(offset);
            self.data.extend_from_slice(v);
        }
    }

    /// Lists to scan for `query`, closest coarse centroid first.
    pub(crate) fn probe_order(&self, query: &[f32]) -> Vec<usize> {
        let mut ranked: Vec<(usize, f32)> = self
            .centroids
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, c)| (i, l2_sq(query, c)))
            .collect();
        ranked.sort_unstable_by_key(|&(_, d)| OrderedFloat(d));
        ranked.truncate(self.nprobe);
        ranked.into_iter().map(|(i, _)| i).collect()
    }

    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = Vec::new();
        for list in self.probe_order(query) {
            for &offset in &self.lists[list] {
                let row = &self.data[offset * self.dim..(offset + 1) * self.dim];
                scored.push((offset, l2_sq(query, row)));
            }
        }
        scored.sort_unstable_by_key(|&(_, d)| OrderedFloat(d));
        scored.truncate(k);
        scored
    }
}
