//! Arrow schemas for collection tables and the collections meta table.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, TimeUnit};

/// Name of the bookkeeping table recording each collection's declared
/// dimension and model. Collection names cannot start with `_`, so this can
/// never collide with a user collection.
pub const META_TABLE: &str = "_collections";

pub fn collection_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("section", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("page", DataType::Int32, true),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            true,
        ),
    ]))
}

pub fn meta_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("dimension", DataType::Int32, false),
        Field::new("model_id", DataType::Utf8, false),
        Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}
