#![deny(unsafe_code)]
//! Core vector store, IVF index, and adaptive search primitives for
//! NanoIndex.
//!
//! Vectors live in a memory-mapped, append-only [`store::VectorStore`].
//! An [`ivf::IvfIndex`] partitions them into k-means cells for
//! approximate search, and an [`agent::AdaptiveAgent`] learns which
//! search strategy tends to answer fastest. [`engine::Engine`] wires all
//! three together behind a single lock.

pub mod agent;
pub mod distance;
pub mod engine;
pub mod fsync;
pub mod ivf;
pub mod kmeans;
pub mod search;
pub mod store;

pub use agent::{
    AdaptiveAgent, AgentReport, Arm, ArmReport, ArmStatistics, SelectionAlgorithm, ARMS,
};
pub use distance::{cosine_batch, cosine_one, l2_batch, l2_one, normalize_in_place, VectorError};
pub use engine::{Engine, EngineError};
pub use ivf::{IndexError, IvfIndex};
pub use kmeans::{kmeans, KMeansConfig, KMeansError, KMeansResult};
pub use search::{search, search_with_agent, Metric, SearchError, SearchHit, SearchOutcome, SearchRequest};
pub use store::{StoreError, VectorStore};
