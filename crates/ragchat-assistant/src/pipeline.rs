use std::sync::Arc;

use ragchat_core::error::Result;
use ragchat_core::types::Chunk;

use crate::llm::ChatModel;
use crate::prompt::{build_messages, format_context};
use crate::retriever::Retriever;

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Chunk>,
}

/// retrieve -> prompt -> chat model.
#[derive(Clone)]
pub struct ResponsePipeline {
    retriever: Retriever,
    model: Arc<dyn ChatModel>,
}

impl ResponsePipeline {
    pub fn new(retriever: Retriever, model: Arc<dyn ChatModel>) -> Self {
        Self { retriever, model }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn answer(&self, query: &str) -> Result<String> {
        Ok(self.answer_with_sources(query).await?.text)
    }

    pub async fn answer_with_sources(&self, query: &str) -> Result<Answer> {
        let sources = self.retriever.retrieve(query).await?;
        let messages = build_messages(&format_context(&sources), query);
        let text = self.model.complete(&messages).await?;
        Ok(Answer { text, sources })
    }
}
