use anyhow::{anyhow, Context, Result};
use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, ListArray, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use std::sync::Arc;
use tracing::debug;

use scholar_core::traits::DocumentStore;
use scholar_core::types::{Chunk, Document, DocumentId};

use crate::schema::{build_chunks_schema, build_papers_schema};
use crate::table::{ensure_table, open_db, sql_literal, string_column};

/// Paper and chunk tables in one LanceDB database.
pub struct LanceStore {
	pub(crate) db: Connection,
	pub(crate) papers_table: String,
	pub(crate) chunks_table: String,
	pub(crate) dim: usize,
}

fn categories_array<'a>(rows: impl Iterator<Item = &'a [String]>) -> ListArray {
	let mut builder = ListBuilder::new(StringBuilder::new());
	for categories in rows {
		for c in categories { builder.values().append_value(c); }
		builder.append(true);
	}
	builder.finish()
}

impl LanceStore {
	pub async fn open(uri: &str, papers_table: &str, chunks_table: &str, dim: usize) -> Result<Self> {
		let db = open_db(uri).await?;
		ensure_table(&db, papers_table, build_papers_schema()).await?;
		ensure_table(&db, chunks_table, build_chunks_schema(dim)).await?;
		Ok(Self { db, papers_table: papers_table.to_string(), chunks_table: chunks_table.to_string(), dim })
	}

	pub fn connection(&self) -> &Connection { &self.db }

	pub async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
		let table = self.db.open_table(&self.papers_table).execute().await?;
		let mut stream = table
			.query()
			.only_if(format!("document_id = {}", sql_literal(document_id)))
			.limit(1)
			.execute()
			.await?;
		while let Some(batch) = stream.try_next().await? {
			if batch.num_rows() == 0 { continue; }
			let json = string_column(&batch, "doc_json")?.value(0);
			return Ok(Some(serde_json::from_str(json).context("decoding stored paper")?));
		}
		Ok(None)
	}

	fn paper_batch(document: &Document) -> Result<RecordBatch> {
		let doc_json = serde_json::to_string(document)?;
		Ok(RecordBatch::try_new(
			build_papers_schema(),
			vec![
				Arc::new(StringArray::from(vec![document.document_id.clone()])),
				Arc::new(StringArray::from(vec![document.title.clone()])),
				Arc::new(categories_array(std::iter::once(document.categories.as_slice()))),
				Arc::new(Int32Array::from(vec![document.year()])),
				Arc::new(StringArray::from(vec![doc_json])),
			],
		)?)
	}

	fn chunk_batch(&self, document: &Document, chunks: &[Chunk]) -> Result<RecordBatch> {
		let doc_json = serde_json::to_string(document)?;
		let dim = i32::try_from(self.dim)?;
		let mut sequence = Vec::with_capacity(chunks.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
		for c in chunks {
			let embedding = c.embedding.as_ref().ok_or_else(|| anyhow!("chunk {} has no embedding", c.key()))?;
			if embedding.len() != self.dim {
				return Err(anyhow!("chunk {} embedding has dimension {}, expected {}", c.key(), embedding.len(), self.dim));
			}
			sequence.push(i32::try_from(c.sequence_index)?);
			vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
		}
		Ok(RecordBatch::try_new(
			build_chunks_schema(self.dim),
			vec![
				Arc::new(StringArray::from(vec![document.document_id.clone(); chunks.len()])),
				Arc::new(Int32Array::from(sequence)),
				Arc::new(StringArray::from(chunks.iter().map(|c| c.section.clone()).collect::<Vec<_>>())),
				Arc::new(StringArray::from(chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>())),
				Arc::new(categories_array(chunks.iter().map(|_| document.categories.as_slice()))),
				Arc::new(Int32Array::from(vec![document.year(); chunks.len()])),
				Arc::new(StringArray::from(vec![doc_json; chunks.len()])),
				Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
			],
		)?)
	}
}

#[async_trait]
impl DocumentStore for LanceStore {
	async fn upsert_document(&self, document: &Document) -> Result<DocumentId> {
		let batch = Self::paper_batch(document)?;
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), build_papers_schema()));
		let table = self.db.open_table(&self.papers_table).execute().await?;
		// document_id is unique: update in place or insert
		let mut mi = table.merge_insert(&["document_id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		mi.execute(reader).await?;
		debug!(document_id = %document.document_id, "upserted paper");
		Ok(document.document_id.clone())
	}

	async fn insert_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<usize> {
		if let Some(stray) = chunks.iter().find(|c| c.document_id != document_id) {
			return Err(anyhow!("chunk {} does not belong to document {document_id}", stray.key()));
		}
		let document = self
			.get_document(document_id)
			.await?
			.ok_or_else(|| anyhow!("document {document_id} must be stored before its chunks"))?;
		let batch = self.chunk_batch(&document, chunks)?;
		let table = self.db.open_table(&self.chunks_table).execute().await?;
		let owned = format!("document_id = {}", sql_literal(document_id));
		if chunks.is_empty() {
			table.delete(&owned).await?;
			return Ok(0);
		}
		// single commit: this paper's rows absent from the batch are deleted
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), build_chunks_schema(self.dim)));
		let mut mi = table.merge_insert(&["document_id", "sequence_index"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all().when_not_matched_by_source_delete(Some(owned));
		mi.execute(reader).await?;
		debug!(document_id, count = chunks.len(), "replaced chunk generation");
		Ok(chunks.len())
	}
}
