//! Query orchestration: combines the vector store, IVF index, distance
//! kernels, and adaptive agent into a single top-k search operation.

use std::error::Error;
use std::fmt;
use std::time::Instant;

use crate::agent::AdaptiveAgent;
use crate::distance::{cosine_batch, l2_batch};
use crate::ivf::{IvfIndex, DEFAULT_NPROBE};
use crate::store::VectorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    L2,
    Cosine,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub position: usize,
    pub score: f32,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub latency_ms: f64,
    /// The arm name the agent picked, or `None` when the agent was not
    /// consulted (the caller drove `use_index` directly).
    pub arm_used: Option<&'static str>,
}

#[derive(Debug)]
pub enum SearchError {
    EmptyStore,
    DimensionMismatch { expected: usize, got: usize },
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyStore => write!(f, "vector store contains no vectors"),
            Self::DimensionMismatch { expected, got } => {
                write!(f, "query dimension mismatch: expected={expected}, got={got}")
            }
        }
    }
}

impl Error for SearchError {}

/// A single search request. `use_index` mirrors the caller-visible
/// `use_index` flag at the HTTP boundary: when `false`, the IVF index is
/// never consulted even if it is trained.
pub struct SearchRequest<'a> {
    pub query: &'a [f32],
    pub top_k: usize,
    pub metric: Metric,
    pub use_index: bool,
}

fn check_preconditions(store: &VectorStore, query: &[f32]) -> Result<(), SearchError> {
    if store.count() == 0 {
        return Err(SearchError::EmptyStore);
    }
    let dimension = store.dimension();
    if query.len() != dimension {
        return Err(SearchError::DimensionMismatch {
            expected: dimension,
            got: query.len(),
        });
    }
    Ok(())
}

/// Runs one search request without agent involvement. `request.use_index`
/// decides whether the IVF index is probed at all; an empty or untrained
/// index silently falls back to a flat scan of the whole store.
pub fn search(
    store: &VectorStore,
    index: &IvfIndex,
    request: SearchRequest<'_>,
) -> Result<SearchOutcome, SearchError> {
    check_preconditions(store, request.query)?;

    let started = Instant::now();
    let candidates = gather_candidates(store, index, request.query, request.use_index, DEFAULT_NPROBE);
    let hits = score_and_rank(store, &candidates, request.query, request.metric, request.top_k);
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    Ok(SearchOutcome {
        hits,
        latency_ms,
        arm_used: None,
    })
}

/// Runs a search with full agent-driven arm selection: the agent chooses the
/// arm up front (overriding `use_index`, `nprobe`, and `max_codes`), and its
/// latency feedback is recorded afterward.
pub fn search_with_agent(
    store: &VectorStore,
    index: &mut IvfIndex,
    agent: &mut AdaptiveAgent,
    query: &[f32],
    top_k: usize,
    metric: Metric,
) -> Result<SearchOutcome, SearchError> {
    check_preconditions(store, query)?;

    let arm = agent.select_arm();
    let prior_max_codes = index.max_codes();
    if let Some(max_codes) = arm.max_codes {
        index.set_max_codes(max_codes);
    }
    let nprobe = arm.nprobe.unwrap_or(DEFAULT_NPROBE);

    let started = Instant::now();
    let candidates = gather_candidates(store, index, query, arm.use_index, nprobe);
    let hits = score_and_rank(store, &candidates, query, metric, top_k);
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    if arm.max_codes.is_some() {
        index.set_max_codes(prior_max_codes);
    }
    agent.update(arm.name, latency_ms);

    Ok(SearchOutcome {
        hits,
        latency_ms,
        arm_used: Some(arm.name),
    })
}

/// Returns candidate row positions: the IVF candidate set when `use_index`
/// is set and the index is trained and non-empty for this query, otherwise
/// every row position in the store (a flat scan).
fn gather_candidates(
    store: &VectorStore,
    index: &IvfIndex,
    query: &[f32],
    use_index: bool,
    nprobe: usize,
) -> Vec<usize> {
    if use_index && index.is_trained() {
        let nprobe = nprobe.min(index.n_cells().max(1));
        let candidates = index.search(query, nprobe);
        if !candidates.is_empty() {
            return candidates;
        }
    }
    (0..store.count()).collect()
}

fn score_and_rank(
    store: &VectorStore,
    candidates: &[usize],
    query: &[f32],
    metric: Metric,
    top_k: usize,
) -> Vec<SearchHit> {
    let dimension = store.dimension();
    let all_vectors = store.vectors();
    let all_norms = store.squared_norms();
    let all_ids = store.ids();

    let mut candidate_matrix = Vec::with_capacity(candidates.len() * dimension);
    let mut candidate_squared_norms = Vec::with_capacity(candidates.len());
    for &position in candidates {
        candidate_matrix.extend_from_slice(&all_vectors[position * dimension..(position + 1) * dimension]);
        candidate_squared_norms.push(all_norms[position]);
    }

    let scores = match metric {
        Metric::L2 => l2_batch(query, &candidate_matrix, dimension, Some(&candidate_squared_norms), false)
            .unwrap_or_default(),
        Metric::Cosine => {
            // The store only caches squared L2 norms; cosine's contract wants
            // plain L2 norms, so derive them rather than passing the cache verbatim.
            let candidate_norms: Vec<f32> =
                candidate_squared_norms.iter().map(|n| n.sqrt()).collect();
            cosine_batch(query, &candidate_matrix, dimension, Some(&candidate_norms), false)
                .unwrap_or_default()
        }
    };

    let mut scored: Vec<SearchHit> = candidates
        .iter()
        .zip(scores)
        .map(|(&position, score)| SearchHit {
            id: all_ids[position],
            position,
            score,
        })
        .collect();

    match metric {
        Metric::L2 => scored.sort_by(|a, b| a.score.total_cmp(&b.score)),
        Metric::Cosine => scored.sort_by(|a, b| b.score.total_cmp(&a.score)),
    }
    scored.truncate(top_k);
    scored
}
