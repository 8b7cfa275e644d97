use std::time::Instant;

use nanoindex_core::IvfIndex;

use crate::bench_utils::{deterministic_vector, read_usize_env_with_min, temp_root};

const DEFAULT_DIMENSION: usize = 128;
const DEFAULT_POINTS: usize = 50_000;
const DEFAULT_N_CELLS: usize = 256;

fn load_dimension() -> usize {
    read_usize_env_with_min("NANOINDEX_BENCH_DIMENSION", DEFAULT_DIMENSION, 1)
}

fn load_points() -> usize {
    read_usize_env_with_min("NANOINDEX_BENCH_IVF_POINTS", DEFAULT_POINTS, 1)
}

fn load_n_cells() -> usize {
    read_usize_env_with_min("NANOINDEX_BENCH_IVF_N_CELLS", DEFAULT_N_CELLS, 1)
}

pub(crate) fn run_ivf_train_bench(mode: &str) -> bool {
    let dimension = load_dimension();
    let points = load_points();
    let n_cells = load_n_cells();

    let root = temp_root("ivf_train");
    if let Err(error) = std::fs::create_dir_all(&root) {
        eprintln!(
            "error=ivf_bench_setup_failed root={} detail=\"{}\"",
            root.display(),
            error
        );
        return false;
    }

    let mut data = Vec::with_capacity(points * dimension);
    for id in 0..points {
        let cluster = (id % n_cells.max(1)) as f32;
        let mut values = deterministic_vector(id as u64, dimension);
        for value in &mut values {
            *value += cluster * 0.1;
        }
        data.extend(values);
    }

    let mut index = IvfIndex::open(&root, dimension);
    let started = Instant::now();
    let result = index.train(&data, n_cells, None);
    let elapsed = started.elapsed();

    if let Err(error) = result {
        eprintln!("error=ivf_train_failed detail=\"{error}\"");
        std::fs::remove_dir_all(&root).ok();
        return false;
    }

    let query = deterministic_vector(0, dimension);
    let search_started = Instant::now();
    let candidates = index.search(&query, 10);
    let search_elapsed = search_started.elapsed();

    println!(
        "bench=ivf_train mode={mode} points={points} dimension={dimension} n_cells={n_cells} train_ms={:.3} cells_trained={} search_ms={:.6} candidates={}",
        elapsed.as_secs_f64() * 1_000.0,
        index.n_cells(),
        search_elapsed.as_secs_f64() * 1_000.0,
        candidates.len()
    );

    std::fs::remove_dir_all(&root).ok();
    true
}
