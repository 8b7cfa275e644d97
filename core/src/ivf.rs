//! Inverted File (IVF) approximate nearest-neighbor index.
//!
//! Vectors are partitioned into `n_cells` inverted lists keyed by their
//! nearest k-means centroid. A query only visits the `nprobe` nearest
//! cells, and cell traversal stops once the accumulated candidate count
//! passes `max_codes` — the last cell visited is always included whole.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::distance::squared_norm;
use crate::kmeans::{kmeans, KMeansConfig, KMeansError};

const CENTROIDS_FILE: &str = "centroids.npy";
const STATE_FILE: &str = "indexer_state.json";
pub const DEFAULT_MAX_CODES: usize = 50_000;
pub const DEFAULT_NPROBE: usize = 10;

#[derive(Debug)]
pub enum IndexError {
    EmptyData,
    DimensionMismatch { expected: usize, got: usize },
    NotTrained,
    KMeans(KMeansError),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyData => write!(f, "cannot train an index on zero rows"),
            Self::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected={expected}, got={got}")
            }
            Self::NotTrained => write!(f, "index has not been trained"),
            Self::KMeans(error) => write!(f, "k-means training failed: {error}"),
        }
    }
}

impl Error for IndexError {}

impl From<KMeansError> for IndexError {
    fn from(error: KMeansError) -> Self {
        Self::KMeans(error)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexState {
    n_cells: usize,
    is_trained: bool,
    cells: Vec<Vec<usize>>,
    max_codes: usize,
}

/// Inverted File index over a fixed-dimension vector population.
pub struct IvfIndex {
    dir: PathBuf,
    dimension: usize,
    n_cells: usize,
    max_codes: usize,
    trained: bool,
    centroids: Vec<f32>,
    centroid_sq_norms: Vec<f32>,
    cells: Vec<Vec<usize>>,
}

impl IvfIndex {
    /// Opens (or prepares to create) index state under `dir`. Any decode
    /// failure on the persisted files is treated as "untrained" rather than
    /// surfaced to the caller, since the index is always rebuildable from
    /// the vector store.
    pub fn open(dir: impl Into<PathBuf>, dimension: usize) -> Self {
        let dir = dir.into();
        let mut index = Self {
            dir,
            dimension,
            n_cells: 0,
            max_codes: DEFAULT_MAX_CODES,
            trained: false,
            centroids: Vec::new(),
            centroid_sq_norms: Vec::new(),
            cells: Vec::new(),
        };
        let _ = index.load();
        index
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Re-points an untrained index at the store's real dimension. The
    /// index is opened before the store has necessarily fixed its
    /// dimension (the store's `D` is only known after its first insert),
    /// so the engine calls this once that dimension becomes known. A
    /// no-op once the index is trained, since a trained index's dimension
    /// is load-bearing for its persisted centroids.
    pub fn align_dimension(&mut self, dimension: usize) {
        if !self.trained {
            self.dimension = dimension;
        }
    }

    /// Trains centroids over `data` (row-major, `data.len() / dimension`
    /// rows) and assigns every row to its nearest cell.
    pub fn train(
        &mut self,
        data: &[f32],
        requested_n_cells: usize,
        row_squared_norms: Option<&[f32]>,
    ) -> Result<(), IndexError> {
        if data.is_empty() {
            return Err(IndexError::EmptyData);
        }
        let dimension = self.dimension;
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                got: data.len(),
            });
        }
        let n_rows = data.len() / dimension;

        let n_cells = if n_rows < requested_n_cells {
            (n_rows / 10).max(1)
        } else {
            requested_n_cells.max(1)
        };

        let result = kmeans(data, dimension, n_cells, KMeansConfig::default())?;

        let mut cells: Vec<Vec<usize>> = vec![Vec::new(); n_cells];
        for (row_index, &label) in result.labels.iter().enumerate() {
            cells[label].push(row_index);
        }

        let centroid_sq_norms: Vec<f32> = result
            .centroids
            .chunks(dimension)
            .map(squared_norm)
            .collect();

        self.n_cells = n_cells;
        self.centroids = result.centroids;
        self.centroid_sq_norms = centroid_sq_norms;
        self.cells = cells;
        self.trained = true;
        let _ = row_squared_norms;
        self.persist()
    }

    /// Assigns newly appended rows (global positions starting at
    /// `base_index`) into existing cells. No-op when untrained.
    pub fn add_vectors(
        &mut self,
        vecs: &[f32],
        base_index: usize,
        row_squared_norms: Option<&[f32]>,
    ) -> Result<(), IndexError> {
        if !self.trained {
            return Ok(());
        }
        let dimension = self.dimension;
        if dimension == 0 || vecs.len() % dimension != 0 {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                got: vecs.len(),
            });
        }
        let n_rows = vecs.len() / dimension;

        let labels: Vec<usize> = (0..n_rows)
            .into_par_iter()
            .map(|row_index| {
                let row = &vecs[row_index * dimension..(row_index + 1) * dimension];
                let row_sq = row_squared_norms
                    .map(|norms| norms[row_index])
                    .unwrap_or_else(|| squared_norm(row));
                self.nearest_cell(row, row_sq)
            })
            .collect();

        for (row_index, label) in labels.into_iter().enumerate() {
            self.cells[label].push(base_index + row_index);
        }
        self.persist()
    }

    fn nearest_cell(&self, row: &[f32], row_sq: f32) -> usize {
        let dimension = self.dimension;
        let mut best_idx = 0usize;
        let mut best_dist = f32::INFINITY;
        for cell_idx in 0..self.n_cells {
            let centroid = &self.centroids[cell_idx * dimension..(cell_idx + 1) * dimension];
            let dot: f32 = row.iter().zip(centroid).map(|(a, b)| a * b).sum();
            let dist = (row_sq + self.centroid_sq_norms[cell_idx] - 2.0 * dot).max(0.0);
            if dist < best_dist {
                best_dist = dist;
                best_idx = cell_idx;
            }
        }
        best_idx
    }

    /// Returns candidate row positions for `query`, visiting the `nprobe`
    /// nearest cells in order and stopping after a cell pushes the running
    /// total past `max_codes` (the triggering cell is included in full).
    pub fn search(&self, query: &[f32], nprobe: usize) -> Vec<usize> {
        if !self.trained {
            return Vec::new();
        }
        let nprobe = nprobe.clamp(1, self.n_cells.max(1));
        let query_sq = squared_norm(query);

        let mut cell_order: Vec<(usize, f32)> = (0..self.n_cells)
            .map(|cell_idx| {
                let centroid = &self.centroids[cell_idx * self.dimension..(cell_idx + 1) * self.dimension];
                let dot: f32 = query.iter().zip(centroid).map(|(a, b)| a * b).sum();
                let dist = (query_sq + self.centroid_sq_norms[cell_idx] - 2.0 * dot).max(0.0);
                (cell_idx, dist)
            })
            .collect();
        cell_order.sort_by(|a, b| a.1.total_cmp(&b.1));
        cell_order.truncate(nprobe);

        let mut candidates = Vec::new();
        for (cell_idx, _) in cell_order {
            candidates.extend_from_slice(&self.cells[cell_idx]);
            if candidates.len() >= self.max_codes {
                break;
            }
        }
        candidates
    }

    pub fn set_max_codes(&mut self, max_codes: usize) {
        self.max_codes = max_codes.max(1);
    }

    pub fn max_codes(&self) -> usize {
        self.max_codes
    }

    /// Clears all cells and marks the index untrained, removing persisted
    /// state.
    pub fn reset(&mut self) -> Result<(), IndexError> {
        self.trained = false;
        self.n_cells = 0;
        self.centroids.clear();
        self.centroid_sq_norms.clear();
        self.cells.clear();
        for name in [CENTROIDS_FILE, STATE_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(&path).map_err(|_| IndexError::NotTrained).ok();
            }
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), IndexError> {
        let state = IndexState {
            n_cells: self.n_cells,
            is_trained: self.trained,
            cells: self.cells.clone(),
            max_codes: self.max_codes,
        };
        let _ = crate::fsync::write_json_atomic(&self.dir.join(STATE_FILE), &state);
        let _ = write_centroids(&self.dir.join(CENTROIDS_FILE), &self.centroids);
        Ok(())
    }

    fn load(&mut self) -> Result<(), ()> {
        let state_path = self.dir.join(STATE_FILE);
        let centroids_path = self.dir.join(CENTROIDS_FILE);
        let state_bytes = fs::read(&state_path).map_err(|_| ())?;
        let state: IndexState = serde_json::from_slice(&state_bytes).map_err(|_| ())?;
        let centroids = read_centroids(&centroids_path, self.dimension).map_err(|_| ())?;
        if self.dimension == 0 || centroids.len() != state.n_cells * self.dimension {
            return Err(());
        }

        self.n_cells = state.n_cells;
        self.trained = state.is_trained;
        self.cells = state.cells;
        self.max_codes = state.max_codes.max(1);
        self.centroid_sq_norms = centroids.chunks(self.dimension).map(squared_norm).collect();
        self.centroids = centroids;
        Ok(())
    }
}

fn write_centroids(path: &Path, centroids: &[f32]) -> std::io::Result<()> {
    crate::fsync::ensure_parent_dir(path)?;
    let temp_path = path.with_extension("tmp");
    let bytes: Vec<u8> = centroids.iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)?;
    crate::fsync::sync_parent_dir(path)?;
    Ok(())
}

fn read_centroids(path: &Path, dimension: usize) -> std::io::Result<Vec<f32>> {
    let bytes = fs::read(path)?;
    if dimension == 0 || bytes.len() % 4 != 0 {
        return Ok(Vec::new());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests;
