//! LanceDB connection and table helpers.
use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::{connect, Connection};
use std::sync::Arc;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
	let names = conn.table_names().execute().await?;
	if names.iter().any(|n| n == name) {
		return Ok(());
	}
	// create empty table with 0 rows
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
	conn.create_table(name, Box::new(iter)).execute().await?;
	Ok(())
}

pub async fn count_rows(conn: &Connection, name: &str) -> Result<usize> {
	let table = conn.open_table(name).execute().await?;
	Ok(table.count_rows(None).await?)
}

/// Quote a value for use inside a Lance SQL predicate.
pub fn sql_literal(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("{name} column missing"))
}

pub(crate) fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<Int32Array>())
		.ok_or_else(|| anyhow!("{name} column missing"))
}

pub(crate) fn distance_column(batch: &RecordBatch) -> Result<&Float32Array> {
	batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.filter(|c| c.null_count() == 0)
		.ok_or_else(|| anyhow!("_distance column missing"))
}
