use std::collections::HashSet;
use std::time::Instant;

use nanoindex_core::{Engine, Metric};

use crate::bench_utils::{deterministic_vector, percentile_ms, temp_root};

const TOPK: usize = 10;
const QUERY_COUNT: usize = 128;

#[derive(Clone, Copy)]
enum DatasetKind {
    Uniform,
    Clustered,
}

#[derive(Clone, Copy)]
struct DatasetSpec {
    name: &'static str,
    points: usize,
    dimension: usize,
    n_cells: usize,
    kind: DatasetKind,
}

#[derive(Clone, Copy)]
enum SearchMode {
    Flat,
    Ivf,
    Agent,
}

impl SearchMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Ivf => "ivf",
            Self::Agent => "agent",
        }
    }
}

struct BenchRow {
    dataset: &'static str,
    mode: SearchMode,
    recall_at_k: f64,
    p50_ms: f64,
    p95_ms: f64,
    p99_ms: f64,
}

pub(crate) fn run_search_quality_bench(mode: &str) -> bool {
    let specs = [
        DatasetSpec {
            name: "uniform_20000_d128",
            points: 20_000,
            dimension: 128,
            n_cells: 128,
            kind: DatasetKind::Uniform,
        },
        DatasetSpec {
            name: "clustered_20000_d128",
            points: 20_000,
            dimension: 128,
            n_cells: 128,
            kind: DatasetKind::Clustered,
        },
    ];

    println!("bench=search_quality mode={mode} query_count={QUERY_COUNT} topk={TOPK}");

    for spec in specs {
        let Some(rows) = run_dataset(spec) else {
            return false;
        };

        println!("dataset={}", spec.name);
        println!("| dataset | mode | recall@{TOPK} | p50_ms | p95_ms | p99_ms |");
        println!("|---|---:|---:|---:|---:|---:|");
        for row in rows {
            println!(
                "| {} | {} | {:.4} | {:.6} | {:.6} | {:.6} |",
                row.dataset,
                row.mode.as_str(),
                row.recall_at_k,
                row.p50_ms,
                row.p95_ms,
                row.p99_ms
            );
            println!(
                "bench=search_quality_row dataset={} mode={} recall_at_k={:.6} p50_ms={:.6} p95_ms={:.6} p99_ms={:.6}",
                row.dataset,
                row.mode.as_str(),
                row.recall_at_k,
                row.p50_ms,
                row.p95_ms,
                row.p99_ms
            );
        }
    }

    true
}

fn run_dataset(spec: DatasetSpec) -> Option<Vec<BenchRow>> {
    let root = temp_root("search_quality");
    std::fs::create_dir_all(&root).ok()?;

    let engine = Engine::open(&root, spec.dimension).ok()?;
    let mut flattened = Vec::with_capacity(spec.points * spec.dimension);
    for id in 0..spec.points {
        flattened.extend(generate_point(spec, id));
    }
    engine.add_vectors(spec.dimension, &flattened, None).ok()?;
    engine.train_index(spec.n_cells).ok()?;

    let queries: Vec<Vec<f32>> = (0..QUERY_COUNT).map(|idx| generate_query(spec, idx)).collect();
    let ground_truth: Vec<HashSet<i64>> = queries
        .iter()
        .map(|query| {
            let outcome = engine
                .search(query, TOPK, Metric::L2, false, false)
                .ok()?;
            Some(outcome.hits.into_iter().map(|hit| hit.id).collect())
        })
        .collect::<Option<Vec<_>>>()?;

    let mut rows = Vec::new();
    for search_mode in [SearchMode::Flat, SearchMode::Ivf, SearchMode::Agent] {
        let (use_index, use_agent) = match search_mode {
            SearchMode::Flat => (false, false),
            SearchMode::Ivf => (true, false),
            SearchMode::Agent => (true, true),
        };

        let mut latencies_ms = Vec::with_capacity(queries.len());
        let mut recall_sum = 0.0f64;

        for (query_idx, query) in queries.iter().enumerate() {
            let started = Instant::now();
            let outcome = engine
                .search(query, TOPK, Metric::L2, use_index, use_agent)
                .ok()?;
            latencies_ms.push(started.elapsed().as_secs_f64() * 1_000.0);

            let measured_ids: HashSet<i64> = outcome.hits.into_iter().map(|hit| hit.id).collect();
            recall_sum += recall_at_k(&measured_ids, &ground_truth[query_idx]);
        }

        rows.push(BenchRow {
            dataset: spec.name,
            mode: search_mode,
            recall_at_k: recall_sum / queries.len() as f64,
            p50_ms: percentile_ms(&latencies_ms, 0.50),
            p95_ms: percentile_ms(&latencies_ms, 0.95),
            p99_ms: percentile_ms(&latencies_ms, 0.99),
        });
    }

    std::fs::remove_dir_all(&root).ok();
    Some(rows)
}

fn generate_point(spec: DatasetSpec, id: usize) -> Vec<f32> {
    match spec.kind {
        DatasetKind::Uniform => deterministic_vector(id as u64, spec.dimension),
        DatasetKind::Clustered => {
            let cluster = (id % 8) as f32;
            let mut values = deterministic_vector((id * 17) as u64, spec.dimension);
            for value in &mut values {
                *value += cluster * 0.25;
            }
            values
        }
    }
}

fn generate_query(spec: DatasetSpec, idx: usize) -> Vec<f32> {
    match spec.kind {
        DatasetKind::Uniform => deterministic_vector((idx * 101 + 7) as u64, spec.dimension),
        DatasetKind::Clustered => {
            let cluster = (idx % 8) as f32;
            let mut query = deterministic_vector((idx * 53 + 11) as u64, spec.dimension);
            for value in &mut query {
                *value += cluster * 0.25;
            }
            query
        }
    }
}

fn recall_at_k(measured: &HashSet<i64>, exact: &HashSet<i64>) -> f64 {
    if exact.is_empty() {
        return 1.0;
    }
    let overlap = measured.intersection(exact).count();
    overlap as f64 / exact.len() as f64
}
