//! Multi-armed bandit query planner.
//!
//! Picks among a fixed set of search strategies ("arms") and learns which
//! one tends to answer fastest, using either epsilon-greedy or UCB1
//! selection. Rewards are `1000 / latency_ms`, so faster arms score higher.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const STATE_FILE: &str = "agent_state.json";
const SNAPSHOT_INTERVAL: u64 = 10;
const DEFAULT_EPSILON: f64 = 0.1;

/// One fixed search strategy the agent can pick between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arm {
    pub name: &'static str,
    pub use_index: bool,
    pub nprobe: Option<usize>,
    pub max_codes: Option<usize>,
}

pub const ARMS: [Arm; 4] = [
    Arm {
        name: "flat",
        use_index: false,
        nprobe: None,
        max_codes: None,
    },
    Arm {
        name: "ivf_conservative",
        use_index: true,
        nprobe: Some(5),
        max_codes: Some(10_000),
    },
    Arm {
        name: "ivf_balanced",
        use_index: true,
        nprobe: Some(10),
        max_codes: Some(50_000),
    },
    Arm {
        name: "ivf_aggressive",
        use_index: true,
        nprobe: Some(20),
        max_codes: Some(100_000),
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionAlgorithm {
    EpsilonGreedy,
    Ucb1,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ArmStatistics {
    pub pulls: u64,
    pub total_reward: f64,
    pub avg_reward: f64,
}

impl ArmStatistics {
    fn update(&mut self, reward: f64) {
        self.pulls += 1;
        self.total_reward += reward;
        self.avg_reward = self.total_reward / self.pulls as f64;
    }
}

/// Per-arm figures returned by [`AdaptiveAgent::get_stats`].
#[derive(Debug, Clone, Serialize)]
pub struct ArmReport {
    pub name: &'static str,
    pub pulls: u64,
    pub avg_reward: f64,
    pub total_reward: f64,
    pub avg_latency_ms: f64,
}

/// Full agent report returned by [`AdaptiveAgent::get_stats`].
#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub algorithm: SelectionAlgorithm,
    pub epsilon: f64,
    pub total_pulls: u64,
    pub arms: Vec<ArmReport>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AgentState {
    algorithm: SelectionAlgorithm,
    epsilon: f64,
    total_pulls: u64,
    statistics: [ArmStatistics; 4],
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            algorithm: SelectionAlgorithm::EpsilonGreedy,
            epsilon: DEFAULT_EPSILON,
            total_pulls: 0,
            statistics: [ArmStatistics::default(); 4],
        }
    }
}

/// Epsilon-greedy / UCB1 bandit selecting among [`ARMS`].
pub struct AdaptiveAgent {
    dir: PathBuf,
    state: AgentState,
    rng: StdRng,
}

impl AdaptiveAgent {
    pub fn new(dir: impl Into<PathBuf>, algorithm: SelectionAlgorithm, epsilon: f64) -> Self {
        let dir = dir.into();
        let mut state = load_state(&dir).unwrap_or_default();
        state.algorithm = algorithm;
        state.epsilon = epsilon;
        Self {
            dir,
            state,
            rng: StdRng::from_entropy(),
        }
    }

    /// Loads persisted state if present, falling back to fresh state on any
    /// read or decode failure.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let state = load_state(&dir).unwrap_or_default();
        Self {
            dir,
            state,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn algorithm(&self) -> SelectionAlgorithm {
        self.state.algorithm
    }

    /// Chooses an arm according to the configured algorithm.
    pub fn select_arm(&mut self) -> Arm {
        match self.state.algorithm {
            SelectionAlgorithm::EpsilonGreedy => self.epsilon_greedy_select(),
            SelectionAlgorithm::Ucb1 => self.ucb1_select(),
        }
    }

    fn epsilon_greedy_select(&mut self) -> Arm {
        if self.rng.gen::<f64>() < self.state.epsilon {
            let index = self.rng.gen_range(0..ARMS.len());
            return ARMS[index];
        }
        self.best_by_avg_reward()
    }

    fn best_by_avg_reward(&self) -> Arm {
        let mut best_index = 0usize;
        let mut best_reward = self.state.statistics[0].avg_reward;
        for (index, stats) in self.state.statistics.iter().enumerate().skip(1) {
            if stats.avg_reward > best_reward {
                best_reward = stats.avg_reward;
                best_index = index;
            }
        }
        ARMS[best_index]
    }

    fn ucb1_select(&self) -> Arm {
        for (index, stats) in self.state.statistics.iter().enumerate() {
            if stats.pulls == 0 {
                return ARMS[index];
            }
        }
        let total_pulls = self.state.total_pulls as f64;
        let mut best_index = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for (index, stats) in self.state.statistics.iter().enumerate() {
            let exploration = (2.0 * total_pulls.ln() / stats.pulls as f64).sqrt();
            let score = stats.avg_reward + exploration;
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }
        ARMS[best_index]
    }

    /// Feeds back the observed latency for `arm_name`. A non-positive
    /// latency is treated as an invalid measurement and ignored.
    pub fn update(&mut self, arm_name: &str, latency_ms: f64) {
        if latency_ms <= 0.0 {
            return;
        }
        let Some(index) = ARMS.iter().position(|arm| arm.name == arm_name) else {
            return;
        };
        let reward = 1000.0 / latency_ms;
        self.state.statistics[index].update(reward);
        self.state.total_pulls += 1;

        if self.state.total_pulls % SNAPSHOT_INTERVAL == 0 {
            let _ = self.save_state();
        }
    }

    pub fn stats(&self) -> [ArmStatistics; 4] {
        self.state.statistics
    }

    pub fn total_pulls(&self) -> u64 {
        self.state.total_pulls
    }

    /// A full report suitable for the agent-stats external interface:
    /// per-arm pulls/rewards plus a derived average latency.
    pub fn get_stats(&self) -> AgentReport {
        let arms = ARMS
            .iter()
            .zip(self.state.statistics.iter())
            .map(|(arm, stats)| ArmReport {
                name: arm.name,
                pulls: stats.pulls,
                avg_reward: stats.avg_reward,
                total_reward: stats.total_reward,
                avg_latency_ms: if stats.avg_reward > 0.0 {
                    1000.0 / stats.avg_reward
                } else {
                    0.0
                },
            })
            .collect();
        AgentReport {
            algorithm: self.state.algorithm,
            epsilon: self.state.epsilon,
            total_pulls: self.state.total_pulls,
            arms,
        }
    }

    /// Clears all statistics and removes the on-disk snapshot, if any.
    pub fn reset(&mut self) {
        self.state.total_pulls = 0;
        self.state.statistics = [ArmStatistics::default(); 4];
        let path = self.dir.join(STATE_FILE);
        if path.exists() {
            let _ = fs::remove_file(path);
        }
    }

    pub fn save_state(&self) -> std::io::Result<()> {
        crate::fsync::write_json_atomic(&self.dir.join(STATE_FILE), &self.state)
    }
}

fn load_state(dir: &Path) -> Option<AgentState> {
    let bytes = fs::read(dir.join(STATE_FILE)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests;
