//! LanceDB connection and Arrow row conversion for the chunk table.

use std::sync::Arc;

use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch, StringArray};
use lancedb::{connect, Connection};

use ragchat_core::error::{Error, Result};
use ragchat_core::types::{Chunk, Meta, SearchHit};

use crate::schema::build_arrow_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(Error::storage)
}

/// Build one record batch; `first_ordinal` is the insertion position of `chunks[0]`.
pub fn chunks_to_record_batch(chunks: &[Chunk], vectors: &[Vec<f32>], first_ordinal: usize, dim: usize) -> Result<RecordBatch> {
    let mut ids = Vec::with_capacity(chunks.len());
    let mut doc_ids = Vec::with_capacity(chunks.len());
    let mut contents = Vec::with_capacity(chunks.len());
    let mut metadata = Vec::with_capacity(chunks.len());
    let mut chunk_indices = Vec::with_capacity(chunks.len());
    let mut total_chunks = Vec::with_capacity(chunks.len());
    let mut ordinals = Vec::with_capacity(chunks.len());
    let mut rows: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
    for (i, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
        ids.push(chunk.id.clone());
        doc_ids.push(chunk.doc_id.clone());
        contents.push(chunk.content.clone());
        metadata.push(serde_json::to_string(&chunk.metadata).map_err(Error::storage)?);
        chunk_indices.push(chunk.chunk_index as i32);
        total_chunks.push(chunk.total_chunks as i32);
        ordinals.push((first_ordinal + i) as i64);
        rows.push(Some(vector.iter().map(|&x| Some(x)).collect()));
    }

    RecordBatch::try_new(
        build_arrow_schema(dim),
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(doc_ids)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(Int32Array::from(total_chunks)),
            Arc::new(Int64Array::from(ordinals)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                rows.into_iter(),
                dim as i32,
            )),
        ],
    )
    .map_err(Error::storage)
}

/// Decode a vector-search result batch into `(ordinal, hit)` pairs, scoring `1 - _distance`.
pub fn record_batch_to_hits(batch: &RecordBatch) -> Result<Vec<(i64, SearchHit)>> {
    let ids = column::<StringArray>(batch, "id")?;
    let doc_ids = column::<StringArray>(batch, "doc_id")?;
    let contents = column::<StringArray>(batch, "content")?;
    let metadata = column::<StringArray>(batch, "metadata")?;
    let chunk_indices = column::<Int32Array>(batch, "chunk_index")?;
    let total_chunks = column::<Int32Array>(batch, "total_chunks")?;
    let ordinals = column::<Int64Array>(batch, "ordinal")?;
    let distances = column::<Float32Array>(batch, "_distance")?;

    (0..batch.num_rows())
        .map(|i| {
            let meta: Meta = serde_json::from_str(metadata.value(i)).map_err(Error::storage)?;
            let chunk = Chunk {
                id: ids.value(i).to_string(),
                doc_id: doc_ids.value(i).to_string(),
                content: contents.value(i).to_string(),
                metadata: meta,
                chunk_index: chunk_indices.value(i).max(0) as usize,
                total_chunks: total_chunks.value(i).max(0) as usize,
            };
            Ok((ordinals.value(i), SearchHit { chunk, score: 1.0 - distances.value(i) }))
        })
        .collect()
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::storage(format!("column '{name}' missing or has an unexpected type")))
}
