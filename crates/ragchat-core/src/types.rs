//! Domain types shared by the loader, the index backends and the assistant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, String>;

/// One element of an ingestion source, exactly as parsed from JSON.
pub type RawRecord = serde_json::Value;

/// A normalized source record: its text plus the remaining fields as metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub content: String,
    pub metadata: Meta,
}

/// A chunk of a document that is independently embedded and retrieved.
///
/// - `id`: `<doc_id>:<chunk_index>`
/// - `doc_id`: identity of the parent document (`<source stem>#<ordinal>`)
/// - `content`: the text payload of the chunk
/// - `metadata`: copied unchanged from the parent document
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub content: String,
    pub metadata: Meta,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A retrieved chunk and its similarity to the query. Higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}
