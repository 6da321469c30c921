//! LanceDB-backed index: one `chunks` table per index directory.

use std::fmt;
use std::path::{Path, PathBuf};

use arrow_array::RecordBatchIterator;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use tracing::{debug, info};

use ragchat_core::error::{Error, Result};
use ragchat_core::types::{Chunk, SearchHit};

use crate::schema::{build_arrow_schema, TABLE_NAME};
use crate::table::{chunks_to_record_batch, open_db, record_batch_to_hits};

const WRITE_BATCH: usize = 1000;

#[derive(Clone)]
pub struct LanceIndex {
    table: Table,
    dir: PathBuf,
    dim: usize,
    len: usize,
    embedder_id: String,
}

impl fmt::Debug for LanceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanceIndex")
            .field("dir", &self.dir)
            .field("dim", &self.dim)
            .field("len", &self.len)
            .field("embedder_id", &self.embedder_id)
            .finish()
    }
}

impl LanceIndex {
    /// Write a fresh table into `dir`, which must not already hold one.
    pub async fn create(dir: &Path, chunks: &[Chunk], vectors: &[Vec<f32>], dim: usize, embedder_id: &str) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::embedding(format!("{} chunks but {} vectors", chunks.len(), vectors.len())));
        }
        std::fs::create_dir_all(dir)?;
        let conn = open_db(&dir.to_string_lossy()).await?;

        let mut batches = Vec::new();
        for (n, (cs, vs)) in chunks.chunks(WRITE_BATCH).zip(vectors.chunks(WRITE_BATCH)).enumerate() {
            batches.push(Ok(chunks_to_record_batch(cs, vs, n * WRITE_BATCH, dim)?));
        }
        let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), build_arrow_schema(dim)));
        let table = conn.create_table(TABLE_NAME, reader).execute().await.map_err(Error::storage)?;
        info!("Wrote {} chunks into LanceDB table at {}", chunks.len(), dir.display());

        Ok(Self { table, dir: dir.to_path_buf(), dim, len: chunks.len(), embedder_id: embedder_id.to_string() })
    }

    pub async fn open(dir: &Path, dim: usize, embedder_id: &str) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::storage(format!("LanceDB directory {} is missing", dir.display())));
        }
        let conn = open_db(&dir.to_string_lossy()).await?;
        let table = conn.open_table(TABLE_NAME).execute().await.map_err(Error::storage)?;
        let len = table.count_rows(None).await.map_err(Error::storage)?;
        Ok(Self { table, dir: dir.to_path_buf(), dim, len, embedder_id: embedder_id.to_string() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    /// Exact cosine search; equal scores are ordered by insertion position.
    ///
    /// LanceDB returns candidates in no particular order among equal distances, so the
    /// candidate window is widened until it holds every row tied with the k-th score.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.len == 0 {
            return Ok(vec![]);
        }
        let mut limit = k.saturating_mul(10).min(self.len);
        loop {
            let mut hits = self.candidates(query, limit).await?;
            hits.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));

            let exhausted = hits.len() < limit || limit >= self.len;
            let tie_cut = match (hits.get(k.saturating_sub(1)), hits.last()) {
                (Some(kth), Some(last)) => kth.1.score == last.1.score,
                _ => false,
            };
            if exhausted || !tie_cut {
                debug!(candidates = hits.len(), k, "lance search");
                return Ok(hits.into_iter().take(k).map(|(_, hit)| hit).collect());
            }
            limit = limit.saturating_mul(4).min(self.len);
        }
    }

    async fn candidates(&self, query: &[f32], limit: usize) -> Result<Vec<(i64, SearchHit)>> {
        let mut stream = self
            .table
            .vector_search(query.to_vec())
            .map_err(Error::storage)?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(Error::storage)?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::storage)? {
            hits.extend(record_batch_to_hits(&batch)?);
        }
        Ok(hits)
    }
}
