//! Persistent, memory-mapped vector store.
//!
//! Vectors, ids, and cached squared norms each live in their own raw,
//! row-major file under the store's directory, sized to a capacity that
//! grows by doubling. `meta.json` records the live `count` and fixed
//! `dimension` so a reopen can recompute capacity from file size without
//! scanning the data.

use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use serde::{Deserialize, Serialize};

use crate::distance::squared_norm;

const VECTORS_FILE: &str = "vectors.npy";
const NORMS_FILE: &str = "norms.npy";
const IDS_FILE: &str = "ids.npy";
const META_FILE: &str = "meta.json";

const F32_SIZE: usize = std::mem::size_of::<f32>();
const I64_SIZE: usize = std::mem::size_of::<i64>();

#[derive(Debug)]
pub enum StoreError {
    DimensionMismatch { expected: usize, got: usize },
    EmptyBatch,
    MismatchedIdCount { vectors: usize, ids: usize },
    NotInitialized,
    Io(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected={expected}, got={got}")
            }
            Self::EmptyBatch => write!(f, "vector batch is empty"),
            Self::MismatchedIdCount { vectors, ids } => write!(
                f,
                "id count {ids} does not match vector count {vectors}"
            ),
            Self::NotInitialized => write!(f, "vector store has not been initialized"),
            Self::Io(error) => write!(f, "store io error: {error}"),
        }
    }
}

impl Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreMeta {
    count: usize,
    dimension: usize,
}

struct MappedFile {
    file: File,
    map: MmapMut,
}

impl MappedFile {
    fn open(path: &Path, byte_len: u64) -> Result<Self, StoreError> {
        let file = crate::fsync::create_fully_synced(path, byte_len)?;
        // Safety: the store owns this file for the lifetime of the mapping
        // and never lets another process or handle write to it concurrently.
        #[allow(unsafe_code)]
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { file, map })
    }

    fn open_existing(path: &Path) -> Result<Self, StoreError> {
        let file = File::options().read(true).write(true).open(path)?;
        // Safety: see `open` above.
        #[allow(unsafe_code)]
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { file, map })
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.map.flush()?;
        Ok(())
    }
}

/// Append-only, memory-mapped store of fixed-dimension vectors with ids and
/// cached squared L2 norms.
pub struct VectorStore {
    dir: PathBuf,
    dimension: usize,
    count: usize,
    capacity: usize,
    vectors: Option<MappedFile>,
    norms: Option<MappedFile>,
    ids: Option<MappedFile>,
}

impl VectorStore {
    /// Opens the store directory, loading existing data if `meta.json` is
    /// present, or returning an uninitialized store otherwise.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let meta_path = dir.join(META_FILE);

        if !meta_path.exists() {
            return Ok(Self {
                dir,
                dimension: 0,
                count: 0,
                capacity: 0,
                vectors: None,
                norms: None,
                ids: None,
            });
        }

        let meta_bytes = fs::read(&meta_path)?;
        let meta: StoreMeta = serde_json::from_slice(&meta_bytes)
            .map_err(|error| StoreError::Io(io::Error::new(io::ErrorKind::InvalidData, error)))?;

        let vectors_path = dir.join(VECTORS_FILE);
        let ids_path = dir.join(IDS_FILE);
        let norms_path = dir.join(NORMS_FILE);

        let vectors = MappedFile::open_existing(&vectors_path)?;
        let capacity = if meta.dimension > 0 {
            vectors.map.len() / (meta.dimension * F32_SIZE)
        } else {
            0
        };
        let ids = MappedFile::open_existing(&ids_path)?;

        let norms = if norms_path.exists() {
            MappedFile::open_existing(&norms_path)?
        } else {
            let mut norms = MappedFile::open(&norms_path, (capacity * F32_SIZE) as u64)?;
            {
                let vectors_slice = as_f32_slice(&vectors.map);
                let norms_slice = as_f32_slice_mut(&mut norms.map);
                for row in 0..meta.count {
                    let row_data = &vectors_slice[row * meta.dimension..(row + 1) * meta.dimension];
                    norms_slice[row] = squared_norm(row_data);
                }
            }
            norms.flush()?;
            norms
        };

        Ok(Self {
            dir,
            dimension: meta.dimension,
            count: meta.count,
            capacity,
            vectors: Some(vectors),
            norms: Some(norms),
            ids: Some(ids),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_initialized(&self) -> bool {
        self.vectors.is_some()
    }

    /// Creates (or re-creates) the backing files for a store of the given
    /// `dimension`, with room for `initial_capacity` rows and `count = 0`.
    pub fn initialize(&mut self, dimension: usize, initial_capacity: usize) -> Result<(), StoreError> {
        let capacity = initial_capacity.max(1);
        let vectors = MappedFile::open(
            &self.dir.join(VECTORS_FILE),
            (capacity * dimension * F32_SIZE) as u64,
        )?;
        let norms = MappedFile::open(&self.dir.join(NORMS_FILE), (capacity * F32_SIZE) as u64)?;
        let ids = MappedFile::open(&self.dir.join(IDS_FILE), (capacity * I64_SIZE) as u64)?;

        self.vectors = Some(vectors);
        self.norms = Some(norms);
        self.ids = Some(ids);
        self.dimension = dimension;
        self.capacity = capacity;
        self.count = 0;
        self.persist_meta()
    }

    fn persist_meta(&self) -> Result<(), StoreError> {
        let meta = StoreMeta {
            count: self.count,
            dimension: self.dimension,
        };
        crate::fsync::write_json_atomic(&self.dir.join(META_FILE), &meta)?;
        Ok(())
    }

    /// Appends `vecs` (row-major, `vecs.len() / dimension` rows). `dimension`
    /// must match the store's fixed dimension once one has been established
    /// by an earlier call. When `ids` is `None`, a dense sequence starting at
    /// the current count is used.
    pub fn add_vectors(
        &mut self,
        dimension: usize,
        vecs: &[f32],
        ids: Option<&[i64]>,
    ) -> Result<usize, StoreError> {
        if vecs.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        if dimension == 0 || vecs.len() % dimension != 0 {
            return Err(StoreError::DimensionMismatch {
                expected: dimension,
                got: vecs.len(),
            });
        }

        if !self.is_initialized() {
            let num_new = vecs.len() / dimension;
            self.initialize(dimension, num_new.max(1000))?;
        }

        let dimension = self.dimension;
        if dimension == 0 || vecs.len() % dimension != 0 {
            return Err(StoreError::DimensionMismatch {
                expected: dimension,
                got: vecs.len(),
            });
        }
        let num_new = vecs.len() / dimension;

        if let Some(ids) = ids {
            if ids.len() != num_new {
                return Err(StoreError::MismatchedIdCount {
                    vectors: num_new,
                    ids: ids.len(),
                });
            }
        }

        if self.count + num_new > self.capacity {
            let new_capacity = (self.capacity * 2).max(self.count + num_new);
            self.resize(new_capacity)?;
        }

        let start = self.count;
        {
            let vectors_map = &mut self.vectors.as_mut().expect("initialized above").map;
            let byte_start = start * dimension * F32_SIZE;
            let byte_len = num_new * dimension * F32_SIZE;
            vectors_map[byte_start..byte_start + byte_len].copy_from_slice(as_bytes(vecs));
        }
        {
            let norms_map = &mut self.norms.as_mut().expect("initialized above").map;
            let mut row_norms = vec![0.0f32; num_new];
            for (row_index, norm_slot) in row_norms.iter_mut().enumerate() {
                let row = &vecs[row_index * dimension..(row_index + 1) * dimension];
                *norm_slot = squared_norm(row);
            }
            let byte_start = start * F32_SIZE;
            norms_map[byte_start..byte_start + num_new * F32_SIZE]
                .copy_from_slice(as_bytes(&row_norms));
        }
        {
            let ids_map = &mut self.ids.as_mut().expect("initialized above").map;
            let owned_ids: Vec<i64>;
            let id_slice: &[i64] = match ids {
                Some(ids) => ids,
                None => {
                    owned_ids = (start as i64..(start + num_new) as i64).collect();
                    &owned_ids
                }
            };
            let byte_start = start * I64_SIZE;
            ids_map[byte_start..byte_start + num_new * I64_SIZE]
                .copy_from_slice(as_bytes_i64(id_slice));
        }

        self.count += num_new;
        self.flush()?;
        self.persist_meta()?;
        Ok(start)
    }

    fn resize(&mut self, new_capacity: usize) -> Result<(), StoreError> {
        self.flush()?;
        let dimension = self.dimension;
        let old_count = self.count;

        let preserved_vectors: Vec<f32> = {
            let map = &self.vectors.as_ref().expect("initialized").map;
            as_f32_slice(map)[0..old_count * dimension].to_vec()
        };
        let preserved_norms: Vec<f32> = {
            let map = &self.norms.as_ref().expect("initialized").map;
            as_f32_slice(map)[0..old_count].to_vec()
        };
        let preserved_ids: Vec<i64> = {
            let map = &self.ids.as_ref().expect("initialized").map;
            as_i64_slice(map)[0..old_count].to_vec()
        };

        self.vectors = None;
        self.norms = None;
        self.ids = None;

        self.initialize(dimension, new_capacity)?;

        {
            let map = &mut self.vectors.as_mut().expect("just initialized").map;
            map[0..preserved_vectors.len() * F32_SIZE].copy_from_slice(as_bytes(&preserved_vectors));
        }
        {
            let map = &mut self.norms.as_mut().expect("just initialized").map;
            map[0..preserved_norms.len() * F32_SIZE].copy_from_slice(as_bytes(&preserved_norms));
        }
        {
            let map = &mut self.ids.as_mut().expect("just initialized").map;
            map[0..preserved_ids.len() * I64_SIZE].copy_from_slice(as_bytes_i64(&preserved_ids));
        }

        self.count = old_count;
        self.persist_meta()
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(vectors) = &self.vectors {
            vectors.flush()?;
        }
        if let Some(norms) = &self.norms {
            norms.flush()?;
        }
        if let Some(ids) = &self.ids {
            ids.flush()?;
        }
        Ok(())
    }

    /// Row-major view over the live `[0, count)` prefix of stored vectors.
    pub fn vectors(&self) -> &[f32] {
        match &self.vectors {
            Some(mapped) => &as_f32_slice(&mapped.map)[0..self.count * self.dimension],
            None => &[],
        }
    }

    /// Cached squared L2 norms for the live prefix.
    pub fn squared_norms(&self) -> &[f32] {
        match &self.norms {
            Some(mapped) => &as_f32_slice(&mapped.map)[0..self.count],
            None => &[],
        }
    }

    /// Caller-visible ids for the live prefix.
    pub fn ids(&self) -> &[i64] {
        match &self.ids {
            Some(mapped) => &as_i64_slice(&mapped.map)[0..self.count],
            None => &[],
        }
    }

    pub fn row(&self, position: usize) -> &[f32] {
        let dimension = self.dimension;
        &self.vectors()[position * dimension..(position + 1) * dimension]
    }

    /// Deletes the backing files and returns the store to its uninitialized
    /// state.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.vectors = None;
        self.norms = None;
        self.ids = None;
        for name in [VECTORS_FILE, NORMS_FILE, IDS_FILE, META_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        self.count = 0;
        self.dimension = 0;
        self.capacity = 0;
        Ok(())
    }
}

fn as_bytes(values: &[f32]) -> &[u8] {
    // Safety: f32 has no padding and any bit pattern is valid, so a
    // reinterpret to bytes is sound for both reads and writes.
    #[allow(unsafe_code)]
    unsafe {
        std::slice::from_raw_parts(values.as_ptr() as *const u8, std::mem::size_of_val(values))
    }
}

fn as_bytes_i64(values: &[i64]) -> &[u8] {
    #[allow(unsafe_code)]
    unsafe {
        std::slice::from_raw_parts(values.as_ptr() as *const u8, std::mem::size_of_val(values))
    }
}

fn as_f32_slice(map: &MmapMut) -> &[f32] {
    #[allow(unsafe_code)]
    unsafe {
        std::slice::from_raw_parts(map.as_ptr() as *const f32, map.len() / F32_SIZE)
    }
}

fn as_f32_slice_mut(map: &mut MmapMut) -> &mut [f32] {
    #[allow(unsafe_code)]
    unsafe {
        std::slice::from_raw_parts_mut(map.as_mut_ptr() as *mut f32, map.len() / F32_SIZE)
    }
}

fn as_i64_slice(map: &MmapMut) -> &[i64] {
    #[allow(unsafe_code)]
    unsafe {
        std::slice::from_raw_parts(map.as_ptr() as *const i64, map.len() / I64_SIZE)
    }
}

#[cfg(test)]
mod tests;
