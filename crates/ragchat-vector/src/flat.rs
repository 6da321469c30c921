//! Brute-force cosine index, persisted as `chunks.jsonl` plus raw little-endian `vectors.f32`.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use ragchat_core::error::{Error, Result};
use ragchat_core::types::{Chunk, SearchHit};

pub const CHUNKS_FILE: &str = "chunks.jsonl";
pub const VECTORS_FILE: &str = "vectors.f32";

#[derive(Debug, Clone)]
pub struct FlatIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    dim: usize,
    embedder_id: String,
}

impl FlatIndex {
    pub fn new(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>, dim: usize, embedder_id: impl Into<String>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::embedding(format!("{} chunks but {} vectors", chunks.len(), vectors.len())));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::embedding(format!("vector dim {} != index dim {}", v.len(), dim)));
        }
        Ok(Self { chunks, vectors, dim, embedder_id: embedder_id.into() })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    /// Top `k` chunks by cosine similarity. Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| SearchHit { chunk: self.chunks[i].clone(), score })
            .collect()
    }

    pub fn write_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let mut out = BufWriter::new(File::create(dir.join(CHUNKS_FILE))?);
        for chunk in &self.chunks {
            serde_json::to_writer(&mut out, chunk).map_err(Error::storage)?;
            out.write_all(b"\n")?;
        }
        out.into_inner().map_err(|e| Error::Io(e.into_error()))?.sync_all()?;

        let mut out = BufWriter::new(File::create(dir.join(VECTORS_FILE))?);
        for v in &self.vectors {
            for x in v {
                out.write_all(&x.to_le_bytes())?;
            }
        }
        out.into_inner().map_err(|e| Error::Io(e.into_error()))?.sync_all()?;
        Ok(())
    }

    pub fn read_from(dir: &Path, dim: usize, expected: usize, embedder_id: &str) -> Result<Self> {
        let reader = BufReader::new(File::open(dir.join(CHUNKS_FILE))?);
        let mut chunks = Vec::with_capacity(expected);
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(&line)
                .map_err(|e| Error::storage(format!("{} line {}: {e}", CHUNKS_FILE, n + 1)))?;
            chunks.push(chunk);
        }

        let mut raw = Vec::new();
        File::open(dir.join(VECTORS_FILE))?.read_to_end(&mut raw)?;
        let width = dim * std::mem::size_of::<f32>();
        if chunks.len() != expected || raw.len() != expected * width {
            return Err(Error::storage(format!(
                "index at {} is inconsistent: manifest says {} chunks, found {} chunks and {} vector bytes",
                dir.display(),
                expected,
                chunks.len(),
                raw.len()
            )));
        }
        let vectors = if dim == 0 {
            vec![Vec::new(); expected]
        } else {
            raw.chunks_exact(width)
                .map(|row| {
                    row.chunks_exact(4)
                        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                        .collect()
                })
                .collect()
        };
        Self::new(chunks, vectors, dim, embedder_id)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
