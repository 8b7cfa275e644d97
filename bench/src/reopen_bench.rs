use std::time::Instant;

use nanoindex_core::{Engine, Metric};

use crate::bench_utils::{deterministic_vector, read_usize_env_with_min, summarize_ms, temp_root};

const DEFAULT_DIMENSION: usize = 64;
const DEFAULT_POINTS: usize = 20_000;
const DEFAULT_N_CELLS: usize = 64;
const DEFAULT_MEASURED_RUNS: usize = 5;

pub(crate) fn run_reopen_bench(mode: &str) -> bool {
    let dimension = read_usize_env_with_min("NANOINDEX_BENCH_DIMENSION", DEFAULT_DIMENSION, 1);
    let points = read_usize_env_with_min("NANOINDEX_BENCH_REOPEN_POINTS", DEFAULT_POINTS, 1);
    let n_cells = read_usize_env_with_min("NANOINDEX_BENCH_REOPEN_N_CELLS", DEFAULT_N_CELLS, 1);
    let measured_runs =
        read_usize_env_with_min("NANOINDEX_BENCH_REOPEN_MEASURED_RUNS", DEFAULT_MEASURED_RUNS, 1);

    let root = temp_root("reopen");
    if let Err(error) = std::fs::create_dir_all(&root) {
        eprintln!(
            "error=reopen_bench_setup_failed root={} detail=\"{}\"",
            root.display(),
            error
        );
        return false;
    }

    let engine = match Engine::open(&root, dimension) {
        Ok(value) => value,
        Err(error) => {
            eprintln!("error=engine_open_failed detail=\"{error}\"");
            std::fs::remove_dir_all(&root).ok();
            return false;
        }
    };

    let mut flattened = Vec::with_capacity(points * dimension);
    for id in 0..points {
        flattened.extend(deterministic_vector(id as u64, dimension));
    }
    if let Err(error) = engine.add_vectors(dimension, &flattened, None) {
        eprintln!("error=engine_add_failed detail=\"{error}\"");
        std::fs::remove_dir_all(&root).ok();
        return false;
    }
    if let Err(error) = engine.train_index(n_cells) {
        eprintln!("error=engine_train_failed detail=\"{error}\"");
        std::fs::remove_dir_all(&root).ok();
        return false;
    }
    drop(engine);

    let mut reopen_ms = Vec::with_capacity(measured_runs);
    let mut search_ms = Vec::with_capacity(measured_runs);
    let query = deterministic_vector(0, dimension);

    for _ in 0..measured_runs {
        let reopen_started = Instant::now();
        let reopened = match Engine::open(&root, dimension) {
            Ok(value) => value,
            Err(error) => {
                eprintln!("error=engine_reopen_failed detail=\"{error}\"");
                std::fs::remove_dir_all(&root).ok();
                return false;
            }
        };
        reopen_ms.push(reopen_started.elapsed().as_secs_f64() * 1_000.0);

        let search_started = Instant::now();
        if let Err(error) = reopened.search(&query, 10, Metric::L2, true, false) {
            eprintln!("error=engine_reopen_search_failed detail=\"{error}\"");
            std::fs::remove_dir_all(&root).ok();
            return false;
        }
        search_ms.push(search_started.elapsed().as_secs_f64() * 1_000.0);
    }

    let (reopen_p50_ms, reopen_p95_ms, reopen_avg_ms) = summarize_ms(&reopen_ms);
    let (search_p50_ms, search_p95_ms, search_avg_ms) = summarize_ms(&search_ms);

    println!(
        "bench=engine_reopen mode={mode} points={points} dimension={dimension} n_cells={n_cells} measured_runs={measured_runs} reopen_p50_ms={reopen_p50_ms:.6} reopen_p95_ms={reopen_p95_ms:.6} reopen_avg_ms={reopen_avg_ms:.6} post_reopen_search_p50_ms={search_p50_ms:.6} post_reopen_search_p95_ms={search_p95_ms:.6} post_reopen_search_avg_ms={search_avg_ms:.6}"
    );

    std::fs::remove_dir_all(&root).ok();
    true
}
