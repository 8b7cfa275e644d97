//! Batched k-means centroid training used by the IVF index.

use std::error::Error;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::distance::squared_norm;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KMeansError {
    EmptyData,
    NotEnoughRows { have: usize, need: usize },
    DimensionMismatch { dimension: usize, data_len: usize },
}

impl fmt::Display for KMeansError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyData => write!(f, "training data is empty"),
            Self::NotEnoughRows { have, need } => {
                write!(f, "not enough rows to train {need} centroids: have {have}")
            }
            Self::DimensionMismatch { dimension, data_len } => write!(
                f,
                "data length {data_len} is not a multiple of dimension {dimension}"
            ),
        }
    }
}

impl Error for KMeansError {}

#[derive(Debug, Clone, Copy)]
pub struct KMeansConfig {
    pub max_iter: usize,
    pub tol: f32,
    pub subsample_size: usize,
    pub seed: Option<u64>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iter: 10,
            tol: 1e-4,
            subsample_size: 10_000,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Row-major `[k, dimension]` centroid matrix.
    pub centroids: Vec<f32>,
    /// One label per row of the *full* input data, in `[0, k)`.
    pub labels: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
}

/// Trains `k` centroids over `data` (row-major, `data.len() / dimension` rows)
/// and returns the final full-data assignment.
pub fn kmeans(
    data: &[f32],
    dimension: usize,
    k: usize,
    config: KMeansConfig,
) -> Result<KMeansResult, KMeansError> {
    if data.is_empty() || dimension == 0 {
        return Err(KMeansError::EmptyData);
    }
    if data.len() % dimension != 0 {
        return Err(KMeansError::DimensionMismatch {
            dimension,
            data_len: data.len(),
        });
    }
    let n_rows = data.len() / dimension;
    if n_rows < k || k == 0 {
        return Err(KMeansError::NotEnoughRows { have: n_rows, need: k });
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let training_rows = sample_row_indices(n_rows, config.subsample_size, &mut rng);
    let mut centroids = initial_centroids(data, dimension, &training_rows, k, &mut rng);

    let mut iterations = 0usize;
    let mut converged = false;
    let mut training_labels = vec![0usize; training_rows.len()];

    for _ in 0..config.max_iter {
        iterations += 1;
        assign_rows(data, dimension, &training_rows, &centroids, &mut training_labels);

        let new_centroids = recompute_centroids(
            data,
            dimension,
            &training_rows,
            &training_labels,
            k,
            &mut rng,
        );

        let max_shift = max_coordinate_shift(&centroids, &new_centroids);
        centroids = new_centroids;
        if max_shift < config.tol {
            converged = true;
            break;
        }
    }

    let all_rows: Vec<usize> = (0..n_rows).collect();
    let mut labels = vec![0usize; n_rows];
    assign_rows(data, dimension, &all_rows, &centroids, &mut labels);

    Ok(KMeansResult {
        centroids,
        labels,
        iterations,
        converged,
    })
}

fn sample_row_indices(n_rows: usize, subsample_size: usize, rng: &mut StdRng) -> Vec<usize> {
    if n_rows <= subsample_size {
        return (0..n_rows).collect();
    }
    let mut indices: Vec<usize> = (0..n_rows).collect();
    indices.shuffle(rng);
    indices.truncate(subsample_size);
    indices
}

fn initial_centroids(
    data: &[f32],
    dimension: usize,
    training_rows: &[usize],
    k: usize,
    rng: &mut StdRng,
) -> Vec<f32> {
    let mut chosen: Vec<usize> = training_rows.to_vec();
    chosen.shuffle(rng);
    chosen.truncate(k);

    let mut centroids = vec![0.0f32; k * dimension];
    for (slot, &row_index) in chosen.iter().enumerate() {
        let row = row_at(data, dimension, row_index);
        centroids[slot * dimension..(slot + 1) * dimension].copy_from_slice(row);
    }
    centroids
}

fn row_at(data: &[f32], dimension: usize, row_index: usize) -> &[f32] {
    &data[row_index * dimension..(row_index + 1) * dimension]
}

fn nearest_centroid(row: &[f32], centroids: &[f32], dimension: usize) -> usize {
    let k = centroids.len() / dimension;
    let row_sq = squared_norm(row);
    let mut best_idx = 0usize;
    let mut best_dist = f32::INFINITY;
    for centroid_idx in 0..k {
        let centroid = &centroids[centroid_idx * dimension..(centroid_idx + 1) * dimension];
        let dot: f32 = row.iter().zip(centroid).map(|(a, b)| a * b).sum();
        let centroid_sq = squared_norm(centroid);
        let dist = (row_sq + centroid_sq - 2.0 * dot).max(0.0);
        if dist < best_dist {
            best_dist = dist;
            best_idx = centroid_idx;
        }
    }
    best_idx
}

fn assign_rows(
    data: &[f32],
    dimension: usize,
    row_indices: &[usize],
    centroids: &[f32],
    labels: &mut [usize],
) {
    labels
        .par_iter_mut()
        .zip(row_indices.par_iter())
        .for_each(|(label, &row_index)| {
            let row = row_at(data, dimension, row_index);
            *label = nearest_centroid(row, centroids, dimension);
        });
}

fn recompute_centroids(
    data: &[f32],
    dimension: usize,
    training_rows: &[usize],
    labels: &[usize],
    k: usize,
    rng: &mut StdRng,
) -> Vec<f32> {
    let mut sums = vec![0.0f32; k * dimension];
    let mut counts = vec![0usize; k];

    for (position, &row_index) in training_rows.iter().enumerate() {
        let cluster = labels[position];
        counts[cluster] += 1;
        let row = row_at(data, dimension, row_index);
        let sum_slice = &mut sums[cluster * dimension..(cluster + 1) * dimension];
        for (sum_value, value) in sum_slice.iter_mut().zip(row) {
            *sum_value += value;
        }
    }

    for cluster in 0..k {
        let count = counts[cluster];
        let slice = &mut sums[cluster * dimension..(cluster + 1) * dimension];
        if count == 0 {
            // Empty cluster: re-seed to a uniformly random training row rather
            // than leaving a stale centroid behind.
            let replacement_row = training_rows[rng.gen_range(0..training_rows.len())];
            slice.copy_from_slice(row_at(data, dimension, replacement_row));
        } else {
            for value in slice.iter_mut() {
                *value /= count as f32;
            }
        }
    }

    sums
}

fn max_coordinate_shift(old: &[f32], new: &[f32]) -> f32 {
    old.iter()
        .zip(new)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_two_cluster_data() -> Vec<f32> {
        vec![
            0.0, 0.0, 0.1, 0.1, 0.0, 0.1, 0.1, 0.0, // cluster near origin
            10.0, 10.0, 10.1, 10.1, 10.0, 10.1, 10.1, 10.0, // cluster near (10,10)
        ]
    }

    #[test]
    fn separates_two_obvious_clusters() {
        let data = make_two_cluster_data();
        let config = KMeansConfig {
            seed: Some(42),
            ..KMeansConfig::default()
        };
        let result = kmeans(&data, 2, 2, config).expect("training should succeed");
        assert_eq!(result.labels.len(), 8);
        let first_label = result.labels[0];
        for label in &result.labels[0..4] {
            assert_eq!(*label, first_label);
        }
        let second_label = result.labels[4];
        assert_ne!(first_label, second_label);
        for label in &result.labels[4..8] {
            assert_eq!(*label, second_label);
        }
    }

    #[test]
    fn rejects_fewer_rows_than_clusters() {
        let data = vec![0.0, 0.0, 1.0, 1.0];
        let err = kmeans(&data, 2, 5, KMeansConfig::default()).unwrap_err();
        assert!(matches!(err, KMeansError::NotEnoughRows { have: 2, need: 5 }));
    }

    #[test]
    fn rejects_empty_data() {
        let err = kmeans(&[], 2, 1, KMeansConfig::default()).unwrap_err();
        assert!(matches!(err, KMeansError::EmptyData));
    }

    #[test]
    fn rejects_misaligned_dimension() {
        let data = vec![0.0, 0.0, 1.0];
        let err = kmeans(&data, 2, 1, KMeansConfig::default()).unwrap_err();
        assert!(matches!(err, KMeansError::DimensionMismatch { .. }));
    }

    #[test]
    fn deterministic_with_fixed_seed() {
        let data = make_two_cluster_data();
        let config = KMeansConfig {
            seed: Some(7),
            ..KMeansConfig::default()
        };
        let first = kmeans(&data, 2, 2, config).unwrap();
        let second = kmeans(&data, 2, 2, config).unwrap();
        assert_eq!(first.centroids, second.centroids);
        assert_eq!(first.labels, second.labels);
    }

    #[test]
    fn subsampling_still_assigns_full_data() {
        let mut data = make_two_cluster_data();
        // Duplicate the data many times so n_rows exceeds a tiny subsample size.
        let base = data.clone();
        for _ in 0..20 {
            data.extend_from_slice(&base);
        }
        let config = KMeansConfig {
            subsample_size: 4,
            seed: Some(1),
            ..KMeansConfig::default()
        };
        let result = kmeans(&data, 2, 2, config).unwrap();
        assert_eq!(result.labels.len(), data.len() / 2);
    }
}
