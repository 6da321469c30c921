//! Recursive character splitter.
//!
//! Lengths are counted in `char`s. Text longer than `chunk_size` is cut into
//! lossless pieces of at most `chunk_size - chunk_overlap` chars, preferring
//! the coarsest separator that works, then packed greedily. Every chunk after
//! the first starts with the last `chunk_overlap` chars of the one before it.

use crate::config::ChunkingSettings;
use crate::error::Result;
use crate::types::{Chunk, Document};

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "? ", "! ", " "];

#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(settings: ChunkingSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { chunk_size: settings.chunk_size, chunk_overlap: settings.chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.chars().count() <= self.chunk_size {
            if text.trim().is_empty() {
                return vec![];
            }
            return vec![text.to_string()];
        }

        let budget = self.chunk_size - self.chunk_overlap;
        let mut pieces = Vec::new();
        split_recursive(text, budget, SEPARATORS, &mut pieces);

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        // chars added since the overlap prefix
        let mut fresh = 0usize;
        for piece in pieces {
            let piece_len = piece.chars().count();
            if fresh > 0 && current_len + piece_len > self.chunk_size {
                let tail = last_chars(&current, self.chunk_overlap).to_string();
                chunks.push(std::mem::replace(&mut current, tail));
                current_len = self.chunk_overlap;
                fresh = 0;
            }
            current.push_str(piece);
            current_len += piece_len;
            fresh += piece_len;
        }
        if fresh > 0 {
            chunks.push(current);
        }
        chunks
    }

    /// Split each document into chunks that inherit its metadata unchanged.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut out = Vec::new();
        for doc in documents {
            let texts = self.split_text(&doc.content);
            let total_chunks = texts.len();
            out.extend(texts.into_iter().enumerate().map(|(chunk_index, content)| Chunk {
                id: format!("{}:{}", doc.doc_id, chunk_index),
                doc_id: doc.doc_id.clone(),
                content,
                metadata: doc.metadata.clone(),
                chunk_index,
                total_chunks,
            }));
        }
        out
    }
}

fn split_recursive<'a>(text: &'a str, budget: usize, separators: &[&str], out: &mut Vec<&'a str>) {
    if text.is_empty() {
        return;
    }
    if text.chars().count() <= budget {
        out.push(text);
        return;
    }
    match separators.split_first() {
        Some((sep, finer)) if text.contains(sep) => {
            for part in text.split_inclusive(sep) {
                split_recursive(part, budget, finer, out);
            }
        }
        Some((_, finer)) => split_recursive(text, budget, finer, out),
        None => {
            let mut start = 0usize;
            let mut count = 0usize;
            for (idx, _) in text.char_indices() {
                if count == budget {
                    out.push(&text[start..idx]);
                    start = idx;
                    count = 0;
                }
                count += 1;
            }
            out.push(&text[start..]);
        }
    }
}

fn last_chars(s: &str, n: usize) -> &str {
    let skip = s.chars().count().saturating_sub(n);
    s.char_indices().nth(skip).map(|(i, _)| &s[i..]).unwrap_or("")
}
