#![forbid(unsafe_code)]
//! Micro-benchmark CLI for NanoIndex: distance kernels, store ingest, IVF
//! training, engine reopen cost, and end-to-end search quality/latency.

use std::env;
use std::process;

use distance_bench::{run_cosine_bench, run_l2_bench};
use ivf_train_bench::run_ivf_train_bench;
use reopen_bench::run_reopen_bench;
use search_quality_bench::run_search_quality_bench;
use store_add_bench::run_store_add_bench;

mod bench_utils;
mod distance_bench;
mod ivf_train_bench;
mod reopen_bench;
mod search_quality_bench;
mod store_add_bench;

fn main() {
    if cfg!(debug_assertions) && env::var("NANOINDEX_ALLOW_DEBUG_BENCH").as_deref() != Ok("1") {
        eprintln!(
            "error=debug_build_not_allowed message=\"run `cargo run --release -p nanoindex-bench`\""
        );
        process::exit(2);
    }

    let mode = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };

    let scenario = env::var("NANOINDEX_BENCH_SCENARIO").unwrap_or_else(|_| "all".to_string());
    let ok = match scenario.as_str() {
        "all" => {
            run_l2_bench(mode)
                && run_cosine_bench(mode)
                && run_store_add_bench(mode)
                && run_ivf_train_bench(mode)
                && run_reopen_bench(mode)
                && run_search_quality_bench(mode)
        }
        "l2" => run_l2_bench(mode),
        "cosine" => run_cosine_bench(mode),
        "store_add" => run_store_add_bench(mode),
        "ivf_train" => run_ivf_train_bench(mode),
        "reopen" => run_reopen_bench(mode),
        "search_quality" => run_search_quality_bench(mode),
        _ => {
            eprintln!(
                "error=invalid_scenario scenario=\"{}\" allowed=\"all,l2,cosine,store_add,ivf_train,reopen,search_quality\"",
                scenario
            );
            false
        }
    };

    if !ok {
        process::exit(1);
    }
}
