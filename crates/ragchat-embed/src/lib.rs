//! Embedding backends: BGE-M3 via candle, and a deterministic hashing embedder.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tracing::info;

use ragchat_core::config::EmbeddingSettings;
use ragchat_core::traits::Embedder;

mod bge;
mod device;
mod hash;
mod pool;
mod tokenize;

pub use bge::BgeM3Embedder;
pub use hash::HashEmbedder;
pub use pool::masked_mean_l2;

/// Build the embedder named by `embedding.model`.
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    match settings.model.to_ascii_lowercase().as_str() {
        "hash" => {
            info!(dim = settings.hash_dim, "Using hashing embedder");
            Ok(Arc::new(HashEmbedder::new(settings.hash_dim)))
        }
        "bge-m3" => {
            let dir = settings
                .model_dir
                .as_deref()
                .ok_or_else(|| anyhow!("embedding.model_dir must be set for bge-m3"))?;
            Ok(Arc::new(BgeM3Embedder::from_dir(dir, settings.max_len)?))
        }
        other => bail!("Unknown embedding model '{}' (expected bge-m3 or hash)", other),
    }
}
