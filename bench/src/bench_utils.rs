use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn average_ms(samples_ms: &[f64]) -> f64 {
    if samples_ms.is_empty() {
        return 0.0;
    }
    samples_ms.iter().sum::<f64>() / samples_ms.len() as f64
}

pub(crate) fn percentile_ms(samples_ms: &[f64], quantile: f64) -> f64 {
    if samples_ms.is_empty() {
        return 0.0;
    }
    let mut sorted = samples_ms.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last_index = sorted.len().saturating_sub(1);
    let position = (quantile.clamp(0.0, 1.0) * last_index as f64).round() as usize;
    sorted[position]
}

pub(crate) fn summarize_ms(samples_ms: &[f64]) -> (f64, f64, f64) {
    (
        percentile_ms(samples_ms, 0.50),
        percentile_ms(samples_ms, 0.95),
        average_ms(samples_ms),
    )
}

pub(crate) fn deterministic_vector(seed: u64, dimension: usize) -> Vec<f32> {
    (0..dimension)
        .map(|index| {
            let mixed = (seed as usize)
                .wrapping_mul(31)
                .wrapping_add(index.wrapping_mul(17))
                % 10_000;
            mixed as f32 / 10_000.0
        })
        .collect()
}

pub(crate) fn read_usize_env_with_min(key: &str, default: usize, min: usize) -> usize {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value >= min => value,
        Ok(value) => {
            eprintln!(
                "warn=invalid_env value={value} env={key} reason=\"must be >= {min}\" using_default={default}"
            );
            default
        }
        Err(_) => {
            eprintln!(
                "warn=invalid_env value=\"{raw}\" env={key} reason=\"parse_usize_failed\" using_default={default}"
            );
            default
        }
    }
}

pub(crate) fn temp_root(label: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("nanoindex_bench_{label}_{stamp}"))
}

pub(crate) fn clean_root(root: &std::path::Path) {
    if let Err(error) = fs::remove_dir_all(root) {
        eprintln!(
            "warn=bench_cleanup_failed root={} detail=\"{}\"",
            root.display(),
            error
        );
    }
}

pub(crate) fn process_rss_bytes() -> u64 {
    let Ok(status) = fs::read_to_string("/proc/self/status") else {
        return 0;
    };
    for line in status.lines() {
        if !line.starts_with("VmRSS:") {
            continue;
        }
        let mut parts = line.split_whitespace();
        let _ = parts.next();
        let Some(kb_raw) = parts.next() else {
            return 0;
        };
        let Ok(kb) = kb_raw.parse::<u64>() else {
            return 0;
        };
        return kb.saturating_mul(1024);
    }
    0
}
