//! Distance kernels used by the search orchestrator and the k-means trainer.
//!
//! The batch L2 kernel uses the expansion identity
//! `‖q − v‖² = ‖q‖² + ‖v‖² − 2·q·v` rather than a direct elementwise
//! subtraction, so that a precomputed squared-norm cache can be reused
//! across many queries against the same matrix.

use std::error::Error;
use std::fmt;

/// Error type for vector distance operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VectorError {
    /// The query dimension did not match the row dimension.
    DimensionMismatch { expected: usize, got: usize },
    /// The vector or matrix had zero length.
    EmptyVector,
    /// Strict validation rejected a NaN or infinite value.
    NonFinite { index: usize, value: f32 },
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected={expected}, got={got}")
            }
            Self::EmptyVector => write!(f, "vector is empty"),
            Self::NonFinite { index, value } => {
                write!(f, "non-finite value at index {index}: {value}")
            }
        }
    }
}

impl Error for VectorError {}

const COSINE_EPSILON: f32 = 1e-10;

fn validate_query(query: &[f32], dimension: usize, strict_finite: bool) -> Result<(), VectorError> {
    if query.is_empty() {
        return Err(VectorError::EmptyVector);
    }
    if query.len() != dimension {
        return Err(VectorError::DimensionMismatch {
            expected: dimension,
            got: query.len(),
        });
    }
    if strict_finite {
        if let Some((index, value)) = query
            .iter()
            .copied()
            .enumerate()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(VectorError::NonFinite { index, value });
        }
    }
    Ok(())
}

/// Squared L2 norm of a single row.
pub fn squared_norm(row: &[f32]) -> f32 {
    row.iter().map(|value| value * value).sum()
}

/// Euclidean distance between two equal-length vectors.
pub fn l2_one(left: &[f32], right: &[f32]) -> Result<f32, VectorError> {
    if left.is_empty() || right.is_empty() {
        return Err(VectorError::EmptyVector);
    }
    if left.len() != right.len() {
        return Err(VectorError::DimensionMismatch {
            expected: left.len(),
            got: right.len(),
        });
    }
    let squared: f32 = left
        .iter()
        .zip(right)
        .map(|(l, r)| {
            let delta = l - r;
            delta * delta
        })
        .sum();
    Ok(squared.max(0.0).sqrt())
}

/// Cosine similarity between two equal-length vectors, using an epsilon
/// denominator rather than an error for near-zero norms.
pub fn cosine_one(left: &[f32], right: &[f32]) -> Result<f32, VectorError> {
    if left.is_empty() || right.is_empty() {
        return Err(VectorError::EmptyVector);
    }
    if left.len() != right.len() {
        return Err(VectorError::DimensionMismatch {
            expected: left.len(),
            got: right.len(),
        });
    }
    let mut dot = 0.0f32;
    let mut left_sq = 0.0f32;
    let mut right_sq = 0.0f32;
    for (l, r) in left.iter().zip(right) {
        dot += l * r;
        left_sq += l * l;
        right_sq += r * r;
    }
    Ok(dot / (left_sq.sqrt() * right_sq.sqrt() + COSINE_EPSILON))
}

/// Batch Euclidean distance from `query` to every row of `matrix` (row-major,
/// `matrix.len() / dimension` rows). `row_squared_norms`, when supplied, must
/// have one entry per row and is used verbatim instead of being recomputed.
pub fn l2_batch(
    query: &[f32],
    matrix: &[f32],
    dimension: usize,
    row_squared_norms: Option<&[f32]>,
    strict_finite: bool,
) -> Result<Vec<f32>, VectorError> {
    validate_query(query, dimension, strict_finite)?;
    if dimension == 0 || matrix.len() % dimension != 0 {
        return Err(VectorError::DimensionMismatch {
            expected: dimension,
            got: matrix.len(),
        });
    }
    let rows = matrix.len() / dimension;
    let q_sq = squared_norm(query);

    let mut out = Vec::with_capacity(rows);
    for row_index in 0..rows {
        let row = &matrix[row_index * dimension..(row_index + 1) * dimension];
        let dot: f32 = query.iter().zip(row).map(|(q, v)| q * v).sum();
        let v_sq = match row_squared_norms {
            Some(cached) => cached[row_index],
            None => squared_norm(row),
        };
        let distance_sq = (q_sq + v_sq - 2.0 * dot).max(0.0);
        out.push(distance_sq.sqrt());
    }
    Ok(out)
}

/// Batch cosine similarity from `query` to every row of `matrix`.
/// `row_norms`, when supplied, are plain (not squared) L2 norms.
pub fn cosine_batch(
    query: &[f32],
    matrix: &[f32],
    dimension: usize,
    row_norms: Option<&[f32]>,
    strict_finite: bool,
) -> Result<Vec<f32>, VectorError> {
    validate_query(query, dimension, strict_finite)?;
    if dimension == 0 || matrix.len() % dimension != 0 {
        return Err(VectorError::DimensionMismatch {
            expected: dimension,
            got: matrix.len(),
        });
    }
    let rows = matrix.len() / dimension;
    let q_norm = squared_norm(query).sqrt();

    let mut out = Vec::with_capacity(rows);
    for row_index in 0..rows {
        let row = &matrix[row_index * dimension..(row_index + 1) * dimension];
        let dot: f32 = query.iter().zip(row).map(|(q, v)| q * v).sum();
        let v_norm = match row_norms {
            Some(cached) => cached[row_index],
            None => squared_norm(row).sqrt(),
        };
        out.push(dot / (q_norm * v_norm + COSINE_EPSILON));
    }
    Ok(out)
}

/// Normalizes a single vector to unit length in place, using an epsilon
/// denominator to avoid division by zero.
pub fn normalize_in_place(vector: &mut [f32]) {
    let norm = squared_norm(vector).sqrt();
    let denom = norm + COSINE_EPSILON;
    for value in vector.iter_mut() {
        *value /= denom;
    }
}

/// Normalizes every row of a row-major matrix to unit length.
pub fn normalize_rows_in_place(matrix: &mut [f32], dimension: usize) {
    if dimension == 0 {
        return;
    }
    for row in matrix.chunks_mut(dimension) {
        normalize_in_place(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(left: f32, right: f32) {
        assert!((left - right).abs() < EPSILON, "expected {left} ~= {right}");
    }

    #[test]
    fn l2_one_matches_direct_computation() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 2.0, 6.0];
        approx_eq(l2_one(&a, &b).unwrap(), 3.0);
    }

    #[test]
    fn cosine_one_is_unit_for_identical_vectors() {
        let a = [3.0, 4.0];
        approx_eq(cosine_one(&a, &a).unwrap(), 1.0);
    }

    #[test]
    fn l2_batch_uses_expansion_identity() {
        let query = [0.0, 0.0];
        let matrix = [3.0, 4.0, 1.0, 0.0];
        let distances = l2_batch(&query, &matrix, 2, None, true).unwrap();
        approx_eq(distances[0], 5.0);
        approx_eq(distances[1], 1.0);
    }

    #[test]
    fn l2_batch_matches_cached_norms() {
        let query = [1.0, 0.0];
        let matrix = [1.0, 0.0, 5.0, 0.0];
        let norms: Vec<f32> = [1.0f32, 5.0].iter().map(|v| v * v).collect();
        let distances = l2_batch(&query, &matrix, 2, Some(&norms), true).unwrap();
        approx_eq(distances[0], 0.0);
        approx_eq(distances[1], 4.0);
    }

    #[test]
    fn l2_batch_handles_tiny_values_without_negative_sqrt() {
        let query = [1e-10, 0.0];
        let matrix = [1e-10, 0.0, 1e10, 0.0];
        let distances = l2_batch(&query, &matrix, 2, None, true).unwrap();
        assert!(distances[0].abs() < 1e-6);
        assert!(distances[1] > 1e9);
    }

    #[test]
    fn cosine_batch_ranks_aligned_vector_first() {
        let query = [1.0, 0.0];
        let matrix = [1.0, 0.0, 0.0, 1.0];
        let sims = cosine_batch(&query, &matrix, 2, None, true).unwrap();
        approx_eq(sims[0], 1.0);
        approx_eq(sims[1], 0.0);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let err = l2_batch(&[1.0, 2.0], &[1.0, 2.0, 3.0], 3, None, true).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));
    }

    #[test]
    fn rejects_empty_query() {
        let err = l2_batch(&[], &[1.0], 1, None, true).unwrap_err();
        assert!(matches!(err, VectorError::EmptyVector));
    }

    #[test]
    fn strict_finite_rejects_nan_query() {
        let err = l2_batch(&[f32::NAN, 0.0], &[1.0, 0.0], 2, None, true).unwrap_err();
        assert!(matches!(err, VectorError::NonFinite { index: 0, .. }));
    }

    #[test]
    fn permissive_mode_allows_non_finite_query() {
        let result = l2_batch(&[f32::NAN, 0.0], &[1.0, 0.0], 2, None, false);
        assert!(result.is_ok());
    }

    #[test]
    fn normalize_in_place_produces_unit_vector() {
        let mut v = [3.0, 4.0];
        normalize_in_place(&mut v);
        approx_eq(squared_norm(&v).sqrt(), 1.0);
    }

    #[test]
    fn normalize_rows_handles_multiple_rows() {
        let mut matrix = [3.0, 4.0, 1.0, 0.0];
        normalize_rows_in_place(&mut matrix, 2);
        approx_eq(squared_norm(&matrix[0..2]).sqrt(), 1.0);
        approx_eq(squared_norm(&matrix[2..4]).sqrt(), 1.0);
    }
}
