//! Composition root tying the vector store, IVF index, and adaptive agent
//! together behind a single lock, mirroring how the wider system wraps one
//! collection per `RwLock`.

use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::agent::{AdaptiveAgent, AgentReport};
use crate::ivf::{IndexError, IvfIndex};
use crate::search::{self, Metric, SearchOutcome, SearchRequest};
use crate::store::{StoreError, VectorStore};

const VECTORS_DIR: &str = "vectors";
const INDEX_DIR: &str = "index";
const AGENT_DIR: &str = "agent";

#[derive(Debug)]
pub enum EngineError {
    Store(StoreError),
    Index(IndexError),
    Search(search::SearchError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(error) => write!(f, "{error}"),
            Self::Index(error) => write!(f, "{error}"),
            Self::Search(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl From<IndexError> for EngineError {
    fn from(error: IndexError) -> Self {
        Self::Index(error)
    }
}

impl From<search::SearchError> for EngineError {
    fn from(error: search::SearchError) -> Self {
        Self::Search(error)
    }
}

struct EngineInner {
    store: VectorStore,
    index: IvfIndex,
    agent: AdaptiveAgent,
}

/// A single collection's worth of vectors, index, and adaptive planner,
/// cloneably shared across request handlers.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<RwLock<EngineInner>>,
}

impl Engine {
    pub fn open(data_dir: impl AsRef<Path>, dimension: usize) -> Result<Self, EngineError> {
        let data_dir = data_dir.as_ref();
        let store = VectorStore::open(data_dir.join(VECTORS_DIR))?;
        let resolved_dimension = if store.is_initialized() {
            store.dimension()
        } else {
            dimension
        };
        let index = IvfIndex::open(data_dir.join(INDEX_DIR), resolved_dimension);
        let agent = AdaptiveAgent::open(data_dir.join(AGENT_DIR));

        Ok(Self {
            inner: Arc::new(RwLock::new(EngineInner { store, index, agent })),
        })
    }

    pub fn add_vectors(
        &self,
        dimension: usize,
        vectors: &[f32],
        ids: Option<&[i64]>,
    ) -> Result<usize, EngineError> {
        let mut inner = self.inner.write().expect("engine lock poisoned");
        let base_index = inner.store.add_vectors(dimension, vectors, ids)?;
        inner.index.align_dimension(inner.store.dimension());
        let row_norms: Vec<f32> = vectors
            .chunks(dimension)
            .map(crate::distance::squared_norm)
            .collect();
        inner.index.add_vectors(vectors, base_index, Some(&row_norms))?;
        Ok(base_index)
    }

    pub fn train_index(&self, n_cells: usize) -> Result<(), EngineError> {
        let mut inner = self.inner.write().expect("engine lock poisoned");
        let dimension = inner.store.dimension();
        if dimension == 0 {
            return Err(EngineError::Store(StoreError::NotInitialized));
        }
        let data = inner.store.vectors().to_vec();
        let norms = inner.store.squared_norms().to_vec();
        inner.index.train(&data, n_cells, Some(&norms))?;
        Ok(())
    }

    pub fn reset_index(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.write().expect("engine lock poisoned");
        inner.index.reset()?;
        Ok(())
    }

    pub fn reset_store(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.write().expect("engine lock poisoned");
        inner.store.reset()?;
        inner.index.reset()?;
        Ok(())
    }

    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        metric: Metric,
        use_index: bool,
        use_agent: bool,
    ) -> Result<SearchOutcome, EngineError> {
        let mut inner = self.inner.write().expect("engine lock poisoned");
        let EngineInner { store, index, agent } = &mut *inner;

        let outcome = if use_agent {
            search::search_with_agent(store, index, agent, query, top_k, metric)?
        } else {
            search::search(
                store,
                index,
                SearchRequest {
                    query,
                    top_k,
                    metric,
                    use_index,
                },
            )?
        };
        Ok(outcome)
    }

    pub fn agent_stats(&self) -> AgentReport {
        let inner = self.inner.read().expect("engine lock poisoned");
        inner.agent.get_stats()
    }

    pub fn reset_agent(&self) {
        let mut inner = self.inner.write().expect("engine lock poisoned");
        inner.agent.reset();
    }

    pub fn vector_count(&self) -> usize {
        self.inner.read().expect("engine lock poisoned").store.count()
    }

    pub fn dimension(&self) -> usize {
        self.inner.read().expect("engine lock poisoned").store.dimension()
    }

    pub fn is_index_trained(&self) -> bool {
        self.inner.read().expect("engine lock poisoned").index.is_trained()
    }
}

#[cfg(test)]
mod tests;
