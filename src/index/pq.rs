//! Inverted-list index over product-quantized codes.

use ordered_float::OrderedFloat;

use super::{kmeans, l2_sq};

/// Largest codebook representable by one 8-bit code.
const MAX_KSUB: usize = 256;

/// IVF index storing 8-bit PQ codes instead of full vectors.
///
/// Each vector is split into `m` sub-vectors and every sub-vector is
/// replaced by the id of its nearest codebook centroid. Vectors are
/// quantized directly, not as residuals against their coarse centroid.
/// Search uses asymmetric distance: per-subspace lookup tables computed
/// once per query, summed per candidate code.
#[derive(Debug)]
pub struct IvfPqIndex {
    pub(crate) dim: usize,
    pub(crate) nlist: usize,
    pub(crate) nprobe: usize,
    /// Sub-space count; `dim % m == 0`.
    pub(crate) m: usize,
    pub(crate) sub_dim: usize,
    /// Centroids per sub-space codebook. 256 with a large enough training
    /// sample, the sample size otherwise.
    pub(crate) ksub: usize,
    /// Coarse centroids, row-major. Empty until trained.
    pub(crate) coarse: Vec<f32>,
    /// Sub-space codebooks, `m * ksub * sub_dim` floats.
    pub(crate) codebooks: Vec<f32>,
    /// Global vector offsets per inverted list.
    pub(crate) lists: Vec<Vec<usize>>,
    /// PQ codes, `m` bytes per vector, in append order.
    pub(crate) codes: Vec<u8>,
}

impl IvfPqIndex {
    pub(crate) fn new(dim: usize, nlist: usize, nprobe: usize, m: usize) -> Self {
        Self {
            dim,
            nlist,
            nprobe,
            m,
            sub_dim: dim / m,
            ksub: 0,
            coarse: Vec::new(),
            codebooks: Vec::new(),
            lists: Vec::new(),
            codes: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        if self.m == 0 { 0 } else { self.codes.len() / self.m }
    }

    pub(crate) fn is_trained(&self) -> bool {
        !self.coarse.is_empty() && !self.codebooks.is_empty()
    }

    /// Callers ensure dimensions match and the sample is at least `nlist`
    /// rows.
    pub(crate) fn train(&mut self, vectors: &[Vec<f32>]) {
        let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
        self.coarse = kmeans::run(&flat, self.dim, self.nlist);
        self.lists = vec![Vec::new(); self.nlist];

        self.ksub = MAX_KSUB.min(vectors.len());
        self.codebooks = Vec::with_capacity(self.m * self.ksub * self.sub_dim);
        for s in 0..self.m {
            let start = s * self.sub_dim;
            let sub_data: Vec<f32> = vectors
                .iter()
                .flat_map(|v| v[start..start + self.sub_dim].iter().copied())
                .collect();
            self.codebooks
                .extend(kmeans::run(&sub_data, self.sub_dim, self.ksub));
        }
    }

    fn codebook(&self, s: usize) -> &[f32] {
        let span = self.ksub * self.sub_dim;
        &self.codebooks[s * span..(s + 1) * span]
    }

    fn encode(&self, v: &[f32], out: &mut Vec<u8>) {
        for s in 0..self.m {
            let sub = &v[s * self.sub_dim..(s + 1) * self.sub_dim];
            let (code, _) = kmeans::nearest(self.codebook(s), self.sub_dim, sub);
            out.push(code as u8);
        }
    }

    pub(crate) fn add(&mut self, vectors: &[Vec<f32>]) {
        for v in vectors {
            let offset = self.len();
            let (list, _) = kmeans::nearest(&self.coarse, self.dim, v);
            self.lists[list].push(offset);
            let mut codes = Vec::with_capacity(self.m);
            self.encode(v, &mut codes);
            self.codes.extend(codes);
        }
    }

    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = self
            .coarse
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, c)| (i, l2_sq(query, c)))
            .collect();
        ranked.sort_unstable_by_key(|&(_, d)| OrderedFloat(d));
        ranked.truncate(self.nprobe);

        // Per-subspace distance tables, one entry per codebook centroid.
        let mut table = vec![0.0f32; self.m * self.ksub];
        for s in 0..self.m {
            let sub = &query[s * self.sub_dim..(s + 1) * self.sub_dim];
            let book = self.codebook(s);
            for j in 0..self.ksub {
                table[s * self.ksub + j] =
                    l2_sq(sub, &book[j * self.sub_dim..(j + 1) * self.sub_dim]);
            }
        }

        let mut scored: Vec<(usize, f32)> = Vec::new();
        for &(list, _) in &ranked {
            for &offset in &self.lists[list] {
                let codes = &self.codes[offset * self.m..(offset + 1) * self.m];
                let d: f32 = codes
                    .iter()
                    .enumerate()
                    .map(|(s, &code)| table[s * self.ksub + code as usize])
                    .sum();
                scored.push((offset, d));
            }
        }
        scored.sort_unstable_by_key(|&(_, d)| OrderedFloat(d));
        scored.truncate(k);
        scored
    }
}
