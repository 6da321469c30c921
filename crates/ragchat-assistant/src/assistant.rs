//! Query flow: cache lookup, credential check, retrieval and generation, cache write.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use ragchat_core::cache::{CacheEntry, ResponseCache};
use ragchat_core::config::Settings;
use ragchat_core::error::{Error, Result};
use ragchat_core::loader::DocumentLoader;
use ragchat_core::traits::Embedder;
use ragchat_core::types::Chunk;
use ragchat_vector::{IndexManager, Manifest};

use crate::llm::{ChatModel, OpenAiChatModel};
use crate::pipeline::ResponsePipeline;
use crate::retriever::{IndexSlot, Retriever};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOrigin {
    Cache,
    Generated,
    /// The model call failed. Nothing was cached.
    Failed { retryable: bool },
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub origin: ReplyOrigin,
    pub sources: Vec<Chunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub sources: usize,
    pub documents: usize,
    pub chunks: usize,
}

pub struct Assistant {
    settings: Settings,
    loader: DocumentLoader,
    manager: Arc<IndexManager>,
    slot: IndexSlot,
    cache: ResponseCache,
    model: Arc<dyn ChatModel>,
    pipeline: ResponsePipeline,
}

impl Assistant {
    pub fn new(settings: Settings, embedder: Arc<dyn Embedder>, model: Arc<dyn ChatModel>) -> Result<Self> {
        settings.validate()?;
        let loader = DocumentLoader::new(settings.chunking)?;
        let manager = Arc::new(IndexManager::new(&settings.index, embedder)?);
        let slot: IndexSlot = Arc::new(RwLock::new(None));
        let cache = ResponseCache::from_settings(&settings);
        let retriever = Retriever::new(slot.clone(), manager.clone(), settings.retrieval.top_k);
        let pipeline = ResponsePipeline::new(retriever, model.clone());
        Ok(Self { settings, loader, manager, slot, cache, model, pipeline })
    }

    /// Wire the configured embedder and the OpenAI-compatible chat model.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let embedder = ragchat_embed::build_embedder(&settings.embedding).map_err(Error::embedding)?;
        let model = Arc::new(OpenAiChatModel::new(settings.llm.clone())?);
        Self::new(settings, embedder, model)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn is_ready(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// Load the persisted index into the slot. Returns whether one was found.
    pub async fn open(&self) -> Result<bool> {
        match self.manager.load().await? {
            Some(index) => {
                *self.slot.write().await = Some(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rebuild the index from `source` (a JSON file or a directory of them) and persist it.
    pub async fn ingest(&self, source: &Path) -> Result<IngestReport> {
        info!("Ingesting {}", source.display());
        let corpus = self.loader.process_path(source)?;
        let index = self.manager.create(&corpus.chunks).await?;
        // Saving discards the previous index's files, so no query may still be reading it.
        let mut slot = self.slot.write().await;
        self.manager.save(&index).await?;
        *slot = Some(index);
        Ok(IngestReport { sources: corpus.sources, documents: corpus.documents.len(), chunks: corpus.chunks.len() })
    }

    /// Load the persisted index, or ingest `source` when there is none.
    pub async fn initialize(&self, source: &Path) -> Result<Option<IngestReport>> {
        if self.open().await? {
            return Ok(None);
        }
        info!("No index found, building one from {}", source.display());
        self.ingest(source).await.map(Some)
    }

    pub async fn ask(&self, query: &str) -> Result<Reply> {
        let key = self.cache.key_for(query);
        match self.cache.get(&key) {
            Ok(Some(entry)) => {
                info!("Answer served from cache");
                return Ok(Reply { text: entry.response, origin: ReplyOrigin::Cache, sources: vec![] });
            }
            Ok(None) => {}
            Err(e) => warn!("Cache read failed, treating as a miss: {e}"),
        }

        self.model.ensure_ready().await?;

        match self.pipeline.answer_with_sources(query).await {
            Ok(answer) => {
                if let Err(e) = self.cache.put(&key, &CacheEntry::new(answer.text.clone())) {
                    warn!("Could not cache answer: {e}");
                }
                Ok(Reply { text: answer.text, origin: ReplyOrigin::Generated, sources: answer.sources })
            }
            Err(e) if e.is_model_failure() => {
                let retryable = e.is_retryable();
                warn!(retryable, "Language model call failed: {e}");
                Ok(Reply { text: failure_message(&e, retryable), origin: ReplyOrigin::Failed { retryable }, sources: vec![] })
            }
            Err(e) => Err(e),
        }
    }

    pub fn clear_cache(&self) -> Result<usize> {
        let removed = self.cache.clear()?;
        info!("Removed {} cached responses", removed);
        Ok(removed)
    }

    pub fn index_manifest(&self) -> Result<Option<Manifest>> {
        self.manager.manifest()
    }
}

fn failure_message(e: &Error, retryable: bool) -> String {
    if retryable {
        format!("Sorry, I couldn't get an answer right now ({e}). Please try again.")
    } else {
        format!("Sorry, I couldn't get an answer ({e}).")
    }
}
