use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const VECTOR_COLUMN: &str = "vector";

/// Row layout of the chunk table; `dim` is the embedder's output size.
pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("content", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, true),
		Field::new("file_name", DataType::Utf8, true),
		Field::new("chunk_id", DataType::Int64, false),
		Field::new(VECTOR_COLUMN, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Declared vector width of a table schema, if it has a fixed-size vector column.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
		DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
		_ => None,
	}
}
