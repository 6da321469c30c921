use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use ragchat_core::error::{Error, Result};
use ragchat_core::types::{Chunk, SearchHit};
use ragchat_vector::{IndexManager, VectorIndex};

/// The live index. Queries take the read lock; a rebuild swaps it under the write lock.
pub type IndexSlot = Arc<RwLock<Option<VectorIndex>>>;

#[derive(Clone)]
pub struct Retriever {
    slot: IndexSlot,
    manager: Arc<IndexManager>,
    top_k: usize,
}

impl Retriever {
    pub fn new(slot: IndexSlot, manager: Arc<IndexManager>, top_k: usize) -> Self {
        Self { slot, manager, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn retrieve_scored(&self, query: &str) -> Result<Vec<SearchHit>> {
        let guard = self.slot.read().await;
        let index = guard.as_ref().ok_or(Error::IndexNotReady)?;
        let q = self.manager.embed_query(query)?;
        let hits = index.search(&q, self.top_k).await?;
        debug!(hits = hits.len(), top_k = self.top_k, "retrieved");
        Ok(hits)
    }

    /// At most `top_k` chunks, most similar first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        Ok(self.retrieve_scored(query).await?.into_iter().map(|h| h.chunk).collect())
    }
}
