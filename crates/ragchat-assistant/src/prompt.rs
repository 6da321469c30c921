use ragchat_core::types::Chunk;

use crate::llm::ChatMessage;

pub const SYSTEM_PROMPT: &str = "You are a careful, friendly assistant that answers questions using the \
reference material supplied with each question. Keep answers accurate and helpful. Never invent facts, \
names, numbers or sources that are not supported by the material. Decline requests for harmful, \
unethical or illegal content. If a question is unclear, say what is unclear instead of guessing.";

/// Exact reply the model is told to give when the context does not cover the question.
pub const FALLBACK_ANSWER: &str = "I don't have that information.";

/// Retrieved chunk contents in retrieval order, separated by blank lines.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n")
}

pub fn user_prompt(context: &str, question: &str) -> String {
    format!(
        "Context: {context}\n\n\
         Question: {question}\n\n\
         Please provide a detailed answer based on the context provided.\n\
         If the context doesn't contain the answer, say \"{FALLBACK_ANSWER}\"."
    )
}

pub fn build_messages(context: &str, question: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_prompt(context, question))]
}
