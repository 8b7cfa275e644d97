use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub(crate) struct AppConfig {
    pub(crate) bind: SocketAddr,
    pub(crate) project_name: String,
    pub(crate) api_v1_str: String,
    pub(crate) data_dir: PathBuf,
    pub(crate) index_filename: String,
    pub(crate) default_top_k: usize,
    pub(crate) max_dimension: usize,
    pub(crate) strict_finite: bool,
    pub(crate) request_timeout_ms: u64,
    pub(crate) max_body_bytes: usize,
    pub(crate) max_concurrency: usize,
    pub(crate) max_topk_limit: usize,
    pub(crate) default_n_cells: usize,
}

impl AppConfig {
    pub(crate) fn from_env() -> Result<Self> {
        let bind = parse_socket_addr("NANOINDEX_BIND", "127.0.0.1:8080")?;
        let project_name = parse_string("PROJECT_NAME", "NanoIndex")?;
        let api_v1_str = parse_string("API_V1_STR", "/api/v1")?;
        let data_dir = parse_path("DATA_DIR", "data")?;
        let index_filename = parse_string("INDEX_FILENAME", "nano.index")?;
        let default_top_k = parse_usize("DEFAULT_TOP_K", 10)?;
        let max_dimension = parse_usize("NANOINDEX_MAX_DIMENSION", 4096)?;
        let strict_finite = parse_bool("NANOINDEX_STRICT_FINITE", true)?;
        let request_timeout_ms = parse_u64("NANOINDEX_REQUEST_TIMEOUT_MS", 5000)?;
        let max_body_bytes = parse_usize("NANOINDEX_MAX_BODY_BYTES", 67_108_864)?;
        let max_concurrency = parse_usize("NANOINDEX_MAX_CONCURRENCY", 256)?;
        let max_topk_limit = parse_usize("NANOINDEX_MAX_TOPK_LIMIT", 1000)?;
        let default_n_cells = parse_usize("NANOINDEX_DEFAULT_N_CELLS", 100)?;

        if project_name.is_empty() {
            anyhow::bail!("PROJECT_NAME must not be empty");
        }
        if data_dir.as_os_str().is_empty() {
            anyhow::bail!("DATA_DIR must not be empty");
        }
        if max_dimension == 0 {
            anyhow::bail!("NANOINDEX_MAX_DIMENSION must be > 0");
        }
        if max_body_bytes == 0 {
            anyhow::bail!("NANOINDEX_MAX_BODY_BYTES must be > 0");
        }
        if max_concurrency == 0 {
            anyhow::bail!("NANOINDEX_MAX_CONCURRENCY must be > 0");
        }
        if max_topk_limit == 0 {
            anyhow::bail!("NANOINDEX_MAX_TOPK_LIMIT must be > 0");
        }
        if default_top_k == 0 || default_top_k > max_topk_limit {
            anyhow::bail!("DEFAULT_TOP_K must be > 0 and <= NANOINDEX_MAX_TOPK_LIMIT");
        }
        if default_n_cells == 0 {
            anyhow::bail!("NANOINDEX_DEFAULT_N_CELLS must be > 0");
        }

        Ok(Self {
            bind,
            project_name,
            api_v1_str,
            data_dir,
            index_filename,
            default_top_k,
            max_dimension,
            strict_finite,
            request_timeout_ms,
            max_body_bytes,
            max_concurrency,
            max_topk_limit,
            default_n_cells,
        })
    }
}

fn parse_socket_addr(key: &str, default: &str) -> Result<SocketAddr> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .with_context(|| format!("{key} must be a valid socket address, got '{raw}'"))
}

fn parse_string(key: &str, default: &str) -> Result<String> {
    Ok(env::var(key).unwrap_or_else(|_| default.to_string()))
}

fn parse_usize(key: &str, default: usize) -> Result<usize> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .with_context(|| format!("{key} must be a positive integer, got '{raw}'"))
}

fn parse_u64(key: &str, default: u64) -> Result<u64> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .with_context(|| format!("{key} must be a positive integer, got '{raw}'"))
}

fn parse_bool(key: &str, default: bool) -> Result<bool> {
    let raw = env::var(key).unwrap_or_else(|_| {
        if default {
            "true".to_string()
        } else {
            "false".to_string()
        }
    });

    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{key} must be a boolean, got '{raw}'"),
    }
}

fn parse_path(key: &str, default: &str) -> Result<PathBuf> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    let path = PathBuf::from(raw);
    if path.as_os_str().is_empty() {
        anyhow::bail!("{key} must not be empty");
    }
    Ok(path)
}
