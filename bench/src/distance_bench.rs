use std::time::{Duration, Instant};

use nanoindex_core::{cosine_one, l2_one};

use crate::bench_utils::{deterministic_vector, read_usize_env_with_min, summarize_ms};

const DEFAULT_DIMENSION: usize = 128;
const DEFAULT_DATASET_SIZE: usize = 10_000;
const DEFAULT_WARMUP_RUNS: usize = 8;
const DEFAULT_MEASURED_RUNS: usize = 50;

#[derive(Clone, Copy)]
struct DistanceBenchConfig {
    dimension: usize,
    dataset_size: usize,
    warmup_runs: usize,
    measured_runs: usize,
}

fn load_config() -> DistanceBenchConfig {
    DistanceBenchConfig {
        dimension: read_usize_env_with_min("NANOINDEX_BENCH_DIMENSION", DEFAULT_DIMENSION, 1),
        dataset_size: read_usize_env_with_min(
            "NANOINDEX_BENCH_DATASET_SIZE",
            DEFAULT_DATASET_SIZE,
            1,
        ),
        warmup_runs: read_usize_env_with_min("NANOINDEX_BENCH_WARMUP_RUNS", DEFAULT_WARMUP_RUNS, 0),
        measured_runs: read_usize_env_with_min(
            "NANOINDEX_BENCH_MEASURED_RUNS",
            DEFAULT_MEASURED_RUNS,
            1,
        ),
    }
}

pub(crate) fn run_l2_bench(mode: &str) -> bool {
    let config = load_config();
    let query = deterministic_vector(42, config.dimension);
    let dataset = generate_dataset(config.dataset_size, config.dimension);

    for _ in 0..config.warmup_runs {
        if scan_min(&query, &dataset, l2_one).is_none() {
            return false;
        }
    }

    let mut elapsed_samples = Vec::with_capacity(config.measured_runs);
    let mut total_duration = Duration::from_secs(0);
    let mut last_best_id = 0usize;
    let mut last_best_distance = f32::MAX;

    for _ in 0..config.measured_runs {
        let Some((elapsed, best_id, best_distance)) = scan_min(&query, &dataset, l2_one) else {
            return false;
        };
        elapsed_samples.push(elapsed.as_secs_f64() * 1_000.0);
        total_duration += elapsed;
        last_best_id = best_id;
        last_best_distance = best_distance;
    }

    let (p50_ms, p95_ms, avg_ms) = summarize_ms(&elapsed_samples);
    let total_ops = (config.measured_runs * config.dataset_size) as f64;
    let qps = total_ops / total_duration.as_secs_f64();

    println!(
        "bench=distance_l2 mode={mode} dataset_size={} dimension={} warmup_runs={} measured_runs={} p50_ms={p50_ms:.6} p95_ms={p95_ms:.6} avg_ms={avg_ms:.6} qps={qps:.2} best_id={last_best_id} best_distance={last_best_distance:.6}",
        config.dataset_size,
        config.dimension,
        config.warmup_runs,
        config.measured_runs
    );

    true
}

pub(crate) fn run_cosine_bench(mode: &str) -> bool {
    let config = load_config();
    let query = deterministic_vector(1337, config.dimension);
    let dataset = generate_dataset(config.dataset_size, config.dimension);

    for _ in 0..config.warmup_runs {
        if scan_max(&query, &dataset, cosine_one).is_none() {
            return false;
        }
    }

    let mut elapsed_samples = Vec::with_capacity(config.measured_runs);
    let mut total_duration = Duration::from_secs(0);
    let mut last_best_id = 0usize;
    let mut last_best_score = f32::MIN;

    for _ in 0..config.measured_runs {
        let Some((elapsed, best_id, best_score)) = scan_max(&query, &dataset, cosine_one) else {
            return false;
        };
        elapsed_samples.push(elapsed.as_secs_f64() * 1_000.0);
        total_duration += elapsed;
        last_best_id = best_id;
        last_best_score = best_score;
    }

    let (p50_ms, p95_ms, avg_ms) = summarize_ms(&elapsed_samples);
    let total_ops = (config.measured_runs * config.dataset_size) as f64;
    let qps = total_ops / total_duration.as_secs_f64();

    println!(
        "bench=distance_cosine mode={mode} dataset_size={} dimension={} warmup_runs={} measured_runs={} p50_ms={p50_ms:.6} p95_ms={p95_ms:.6} avg_ms={avg_ms:.6} qps={qps:.2} best_id={last_best_id} best_score={last_best_score:.6}",
        config.dataset_size,
        config.dimension,
        config.warmup_runs,
        config.measured_runs
    );

    true
}

type Kernel = fn(&[f32], &[f32]) -> Result<f32, nanoindex_core::VectorError>;

fn scan_min(query: &[f32], dataset: &[Vec<f32>], kernel: Kernel) -> Option<(Duration, usize, f32)> {
    let started_at = Instant::now();
    let mut best_id = 0usize;
    let mut best_score = f32::MAX;

    for (id, candidate) in dataset.iter().enumerate() {
        let score = match kernel(query, candidate) {
            Ok(value) => value,
            Err(error) => {
                eprintln!("error=distance_kernel_failed detail=\"{error}\"");
                return None;
            }
        };
        if id == 0 || score < best_score {
            best_score = score;
            best_id = id;
        }
    }

    Some((started_at.elapsed(), best_id, best_score))
}

fn scan_max(query: &[f32], dataset: &[Vec<f32>], kernel: Kernel) -> Option<(Duration, usize, f32)> {
    let started_at = Instant::now();
    let mut best_id = 0usize;
    let mut best_score = f32::MIN;

    for (id, candidate) in dataset.iter().enumerate() {
        let score = match kernel(query, candidate) {
            Ok(value) => value,
            Err(error) => {
                eprintln!("error=distance_kernel_failed detail=\"{error}\"");
                return None;
            }
        };
        if id == 0 || score > best_score {
            best_score = score;
            best_id = id;
        }
    }

    Some((started_at.elapsed(), best_id, best_score))
}

fn generate_dataset(size: usize, dimension: usize) -> Vec<Vec<f32>> {
    (0..size)
        .map(|id| deterministic_vector(id as u64, dimension))
        .collect()
}
