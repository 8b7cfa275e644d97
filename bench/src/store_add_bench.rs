use std::time::{Duration, Instant};

use nanoindex_core::VectorStore;

use crate::bench_utils::{
    deterministic_vector, process_rss_bytes, read_usize_env_with_min, summarize_ms, temp_root,
};

const DEFAULT_DIMENSION: usize = 128;
const DEFAULT_POINTS: usize = 10_000;
const DEFAULT_WARMUP_RUNS: usize = 3;
const DEFAULT_MEASURED_RUNS: usize = 15;

#[derive(Clone, Copy)]
struct StoreBenchConfig {
    dimension: usize,
    points: usize,
    warmup_runs: usize,
    measured_runs: usize,
}

fn load_config() -> StoreBenchConfig {
    StoreBenchConfig {
        dimension: read_usize_env_with_min("NANOINDEX_BENCH_DIMENSION", DEFAULT_DIMENSION, 1),
        points: read_usize_env_with_min("NANOINDEX_BENCH_STORE_POINTS", DEFAULT_POINTS, 1),
        warmup_runs: read_usize_env_with_min(
            "NANOINDEX_BENCH_STORE_WARMUP_RUNS",
            DEFAULT_WARMUP_RUNS,
            0,
        ),
        measured_runs: read_usize_env_with_min(
            "NANOINDEX_BENCH_STORE_MEASURED_RUNS",
            DEFAULT_MEASURED_RUNS,
            1,
        ),
    }
}

pub(crate) fn run_store_add_bench(mode: &str) -> bool {
    let config = load_config();

    for _ in 0..config.warmup_runs {
        if run_once(config).is_none() {
            return false;
        }
    }

    let mut add_ms = Vec::with_capacity(config.measured_runs);
    let mut row_ms = Vec::with_capacity(config.measured_runs);
    let mut total_add = Duration::from_secs(0);
    let mut total_row = Duration::from_secs(0);
    let mut checksum = 0usize;
    let mut rss_delta_bytes_max = 0u64;

    for _ in 0..config.measured_runs {
        let Some((add_elapsed, row_elapsed, sample_checksum, rss_delta_bytes)) = run_once(config)
        else {
            return false;
        };
        add_ms.push(add_elapsed.as_secs_f64() * 1_000.0);
        row_ms.push(row_elapsed.as_secs_f64() * 1_000.0);
        total_add += add_elapsed;
        total_row += row_elapsed;
        checksum = sample_checksum;
        rss_delta_bytes_max = rss_delta_bytes_max.max(rss_delta_bytes);
    }

    let (add_p50_ms, add_p95_ms, add_avg_ms) = summarize_ms(&add_ms);
    let (row_p50_ms, row_p95_ms, row_avg_ms) = summarize_ms(&row_ms);
    let ops = (config.measured_runs * config.points) as f64;
    let add_qps = ops / total_add.as_secs_f64();
    let row_qps = ops / total_row.as_secs_f64();
    let raw_vector_bytes = config
        .points
        .saturating_mul(config.dimension)
        .saturating_mul(std::mem::size_of::<f32>());
    let rss_bytes_per_point = if config.points == 0 {
        0.0
    } else {
        rss_delta_bytes_max as f64 / config.points as f64
    };

    println!(
        "bench=store_add mode={mode} points={} dimension={} warmup_runs={} measured_runs={} add_p50_ms={add_p50_ms:.6} add_p95_ms={add_p95_ms:.6} add_avg_ms={add_avg_ms:.6} add_qps={add_qps:.2} row_p50_ms={row_p50_ms:.6} row_p95_ms={row_p95_ms:.6} row_avg_ms={row_avg_ms:.6} row_qps={row_qps:.2} raw_vector_bytes={} raw_vector_mb={:.3} rss_delta_bytes_max={} rss_bytes_per_point={rss_bytes_per_point:.2} checksum={checksum}",
        config.points,
        config.dimension,
        config.warmup_runs,
        config.measured_runs,
        raw_vector_bytes,
        raw_vector_bytes as f64 / (1024.0 * 1024.0),
        rss_delta_bytes_max
    );

    true
}

fn run_once(config: StoreBenchConfig) -> Option<(Duration, Duration, usize, u64)> {
    let root = temp_root("store_add");
    if let Err(error) = std::fs::create_dir_all(&root) {
        eprintln!(
            "error=store_bench_setup_failed root={} detail=\"{}\"",
            root.display(),
            error
        );
        return None;
    }

    let mut store = match VectorStore::open(&root) {
        Ok(value) => value,
        Err(error) => {
            eprintln!("error=store_open_failed detail=\"{error}\"");
            std::fs::remove_dir_all(&root).ok();
            return None;
        }
    };
    let rss_before = process_rss_bytes();

    let mut flattened = Vec::with_capacity(config.points * config.dimension);
    for id in 0..config.points {
        flattened.extend(deterministic_vector(id as u64, config.dimension));
    }

    let add_started = Instant::now();
    if let Err(error) = store.add_vectors(config.dimension, &flattened, None) {
        eprintln!("error=store_add_failed detail=\"{error}\"");
        std::fs::remove_dir_all(&root).ok();
        return None;
    }
    let add_elapsed = add_started.elapsed();
    let rss_after_add = process_rss_bytes();
    let rss_delta_bytes = rss_after_add.saturating_sub(rss_before);

    let row_started = Instant::now();
    let mut checksum = 0usize;
    for id in 0..config.points {
        let row = store.row(id);
        checksum = checksum.wrapping_add(row.len());
    }
    let row_elapsed = row_started.elapsed();

    std::fs::remove_dir_all(&root).ok();
    Some((add_elapsed, row_elapsed, checksum, rss_delta_bytes))
}
