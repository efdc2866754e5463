use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

fn categories_type() -> DataType {
	DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
}

/// One row per paper; `doc_json` carries the full record for payload rebuilding.
pub fn build_papers_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("document_id", DataType::Utf8, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("categories", categories_type(), true),
		Field::new("year", DataType::Int32, true),
		Field::new("doc_json", DataType::Utf8, false),
	]))
}

/// One row per chunk, with the paper fields filters need copied in.
pub fn build_chunks_schema(dim: usize) -> Arc<Schema> {
	let dim = i32::try_from(dim).unwrap_or(i32::MAX);
	Arc::new(Schema::new(vec![
		Field::new("document_id", DataType::Utf8, false),
		Field::new("sequence_index", DataType::Int32, false),
		Field::new("section", DataType::Utf8, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("categories", categories_type(), true),
		Field::new("year", DataType::Int32, true),
		Field::new("doc_json", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
