//! Deterministic k-means used to train IVF coarse quantizers and PQ
//! codebooks.
//!
//! Initialization picks evenly spaced input rows instead of random ones, so
//! training the same sample always yields the same centroids.

use rayon::prelude::*;

use super::l2_sq;

const MAX_ITERATIONS: usize = 25;

/// Clusters `data` (row-major, `dim` floats per row) into `k` centroids.
///
/// Callers guarantee `k >= 1` and at least `k` rows. Empty clusters keep
/// their previous centroid. Stops early once assignments stabilize.
pub(crate) fn run(data: &[f32], dim: usize, k: usize) -> Vec<f32> {
    let n = data.len() / dim;
    let mut centroids: Vec<f32> = (0..k)
        .flat_map(|i| {
            let row = i * n / k;
            data[row * dim..(row + 1) * dim].iter().copied()
        })
        .collect();
    let mut assignments: Vec<usize> = vec![usize::MAX; n];

    for _ in 0..MAX_ITERATIONS {
        let next: Vec<usize> = data
            .par_chunks_exact(dim)
            .map(|row| nearest(&centroids, dim, row).0)
            .collect();
        if next == assignments {
            break;
        }
        assignments = next;

        let mut sums = vec![0.0f32; k * dim];
        let mut counts = vec![0usize; k];
        for (row, &cluster) in data.chunks_exact(dim).zip(&assignments) {
            counts[cluster] += 1;
            for (s, x) in sums[cluster * dim..(cluster + 1) * dim].iter_mut().zip(row) {
                *s += x;
            }
        }
        for cluster in 0..k {
            if counts[cluster] == 0 {
                continue;
            }
            let inv = 1.0 / counts[cluster] as f32;
            for (c, s) in centroids[cluster * dim..(cluster + 1) * dim]
                .iter_mut()
                .zip(&sums[cluster * dim..(cluster + 1) * dim])
            {
                *c = s * inv;
            }
        }
    }
    centroids
}

/// Index and squared distance of the centroid closest to `v`.
pub(crate) fn nearest(centroids: &[f32], dim: usize, v: &[f32]) -> (usize, f32) {
    let mut best = (0usize, f32::INFINITY);
    for (i, c) in centroids.chunks_exact(dim).enumerate() {
        let d = l2_sq(v, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<f32> {
        let mut data = Vec::new();
        for i in 0..10 {
            data.extend_from_slice(&[i as f32 * 0.01, 0.0]);
        }
        for i in 0..10 {
            data.extend_from_slice(&[100.0 + i as f32 * 0.01, 0.0]);
        }
        data
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let data = two_blobs();
        let centroids = run(&data, 2, 2);
        assert_eq!(centroids.len(), 4);

        let (low, _) = nearest(&centroids, 2, &[0.05, 0.0]);
        let (high, _) = nearest(&centroids, 2, &[100.05, 0.0]);
        assert_ne!(low, high);
        for row in data.chunks_exact(2) {
            let (c, _) = nearest(&centroids, 2, row);
            assert_eq!(c, if row[0] < 50.0 { low } else { high });
        }
    }

    #[test]
    fn training_is_deterministic() {
        let data = two_blobs();
        assert_eq!(run(&data, 2, 2), run(&data, 2, 2));
    }

    #[test]
    fn k_equal_to_n_keeps_every_row() {
        let data = vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let centroids = run(&data, 2, 3);
        for (i, row) in data.chunks_exact(2).enumerate() {
            assert_eq!(nearest(&centroids, 2, row).0, i);
        }
    }
}
