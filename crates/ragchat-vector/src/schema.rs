use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const TABLE_NAME: &str = "chunks";

/// Arrow layout of the chunk table. `ordinal` is the insertion position and
/// breaks score ties; `metadata` holds the chunk metadata as a JSON object.
pub fn build_arrow_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("total_chunks", DataType::Int32, false),
        Field::new("ordinal", DataType::Int64, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            true,
        ),
    ]))
}
