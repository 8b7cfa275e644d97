use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use nanoindex_core::Engine;
use anyhow::{Context, Result};

use crate::config::AppConfig;

#[derive(Debug, Default)]
pub(crate) struct MetricsState {
    pub(crate) http_requests_total: AtomicU64,
    pub(crate) http_requests_in_flight: AtomicU64,
    pub(crate) http_responses_2xx_total: AtomicU64,
    pub(crate) http_responses_4xx_total: AtomicU64,
    pub(crate) http_responses_5xx_total: AtomicU64,
    pub(crate) http_request_duration_us_total: AtomicU64,
    pub(crate) search_queries_total: AtomicU64,
    pub(crate) index_add_requests_total: AtomicU64,
    pub(crate) index_train_requests_total: AtomicU64,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) started_at: Instant,
    pub(crate) config: Arc<AppConfig>,
    pub(crate) engine: Engine,
    pub(crate) engine_loaded: Arc<AtomicBool>,
    pub(crate) storage_available: Arc<AtomicBool>,
    pub(crate) metrics: Arc<MetricsState>,
}

impl AppState {
    pub(crate) fn new(config: AppConfig) -> Result<Self> {
        let data_dir = config.data_dir.clone();
        let engine = Engine::open(&data_dir, config.max_dimension)
            .with_context(|| format!("failed to open engine at '{}'", data_dir.display()))?;

        Ok(Self {
            started_at: Instant::now(),
            config: Arc::new(config),
            engine,
            engine_loaded: Arc::new(AtomicBool::new(true)),
            storage_available: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(MetricsState::default()),
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(config: AppConfig) -> Self {
        Self::new(config).expect("failed to initialize test application state")
    }

    pub(crate) fn ready(&self) -> bool {
        self.engine_loaded.load(Ordering::Relaxed) && self.storage_available.load(Ordering::Relaxed)
    }
}
