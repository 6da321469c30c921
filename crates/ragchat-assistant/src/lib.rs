//! Retrieval-augmented answering over the indexed corpus.

pub mod assistant;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use assistant::{Assistant, IngestReport, Reply, ReplyOrigin};
pub use llm::{ChatMessage, ChatModel, OpenAiChatModel};
pub use pipeline::{Answer, ResponsePipeline};
pub use retriever::{IndexSlot, Retriever};
