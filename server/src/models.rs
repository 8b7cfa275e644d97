use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct LiveResponse {
    pub(crate) status: &'static str,
    pub(crate) uptime_ms: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReadyChecks {
    pub(crate) engine_loaded: bool,
    pub(crate) storage_available: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReadyResponse {
    pub(crate) status: &'static str,
    pub(crate) uptime_ms: u64,
    pub(crate) checks: ReadyChecks,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MetricParam {
    #[default]
    L2,
    Cosine,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRequestBody {
    pub(crate) vector: Vec<f32>,
    pub(crate) top_k: Option<usize>,
    pub(crate) id: Option<i64>,
    #[serde(default)]
    pub(crate) metric: MetricParam,
    #[serde(default = "default_true")]
    pub(crate) use_index: bool,
    #[serde(default)]
    pub(crate) use_agent: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchHitResponse {
    pub(crate) id: i64,
    pub(crate) score: f32,
}

#[derive(Debug, Serialize)]
pub(crate) struct SearchResponse {
    pub(crate) query_id: Option<i64>,
    pub(crate) results: Vec<SearchHitResponse>,
    pub(crate) latency_ms: f64,
    pub(crate) strategy: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndexAddRequest {
    pub(crate) vectors: Vec<Vec<f32>>,
    pub(crate) ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct IndexAddResponse {
    pub(crate) count: usize,
    pub(crate) total_count: usize,
    pub(crate) message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndexTrainParams {
    pub(crate) n_cells: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct IndexTrainResponse {
    pub(crate) n_cells: usize,
    pub(crate) total_count: usize,
    pub(crate) message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct IndexResetResponse {
    pub(crate) message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ArmStatsResponse {
    pub(crate) name: &'static str,
    pub(crate) pulls: u64,
    pub(crate) total_reward: f64,
    pub(crate) avg_reward: f64,
    pub(crate) avg_latency_ms: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AgentStatsResponse {
    pub(crate) algorithm: &'static str,
    pub(crate) total_pulls: u64,
    pub(crate) arms: Vec<ArmStatsResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AgentResetResponse {
    pub(crate) message: String,
}
