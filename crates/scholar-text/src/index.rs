use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use scholar_core::traits::TextIndexer;
use scholar_core::types::{Chunk, Document, HitKey, IdentitySpace};

use chrono::Datelike;

use crate::tantivy_utils::{build_schema, register_tokenizer, Fields, KIND_CHUNK, KIND_DOCUMENT, UNDATED};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Replacement key for a record. The kind prefix keeps a paper id that looks
/// like `id#n` apart from chunk `n` of paper `id`.
pub(crate) fn record_key(key: &HitKey) -> String {
	match key {
		HitKey::Document { document_id } => format!("{KIND_DOCUMENT}:{document_id}"),
		HitKey::Chunk { document_id, sequence_index } => format!("{KIND_CHUNK}:{document_id}#{sequence_index}"),
	}
}

/// Tantivy-backed lexical index over paper records or paper chunks.
///
/// Cloning is cheap; clones share the reader and the single writer.
#[derive(Clone)]
pub struct TantivyIndex {
	pub(crate) inner: Arc<Inner>,
	pub(crate) space: Option<IdentitySpace>,
}

pub(crate) struct Inner {
	pub(crate) index: Index,
	pub(crate) reader: IndexReader,
	pub(crate) fields: Fields,
	writer: Mutex<Option<IndexWriter>>,
}

impl TantivyIndex {
	/// Create a fresh index in `index_dir`, removing any previous one.
	pub fn create(index_dir: &Path) -> Result<Self> {
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		let index = Index::create_in_dir(index_dir, build_schema())?;
		info!(dir = %index_dir.display(), "created tantivy index");
		Self::from_index(index)
	}

	pub fn open(index_dir: &Path) -> Result<Self> {
		let index = Index::open_in_dir(index_dir)?;
		Self::from_index(index)
	}

	/// Open the index in `index_dir`, creating it when the directory holds none.
	pub fn open_or_create(index_dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(index_dir)?;
		let dir = tantivy::directory::MmapDirectory::open(index_dir)?;
		let index = Index::open_or_create(dir, build_schema())?;
		Self::from_index(index)
	}

	pub fn in_memory() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let fields = Fields::resolve(&index.schema())?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { inner: Arc::new(Inner { index, reader, fields, writer: Mutex::new(None) }), space: None })
	}

	/// A handle whose searches only return records of `space`.
	pub fn restricted_to(&self, space: IdentitySpace) -> Self {
		Self { inner: Arc::clone(&self.inner), space: Some(space) }
	}

	pub fn num_docs(&self) -> u64 {
		self.inner.reader.searcher().num_docs()
	}
}

impl Inner {
	/// Add or replace records by key, commit, and make them visible to searches.
	/// With `supersede`, every chunk record of that document is dropped first.
	fn write(&self, docs: Vec<(String, TantivyDocument)>, supersede: Option<String>) -> Result<usize> {
		let mut guard = self.writer.lock().map_err(|_| anyhow!("tantivy writer lock poisoned"))?;
		if guard.is_none() { *guard = Some(self.index.writer(WRITER_HEAP_BYTES)?); }
		let writer = guard.as_mut().ok_or_else(|| anyhow!("tantivy writer unavailable"))?;
		if let Some(document_id) = supersede {
			let stale: Vec<(Occur, Box<dyn Query>)> = vec![
				(Occur::Must, Box::new(TermQuery::new(Term::from_field_text(self.fields.document_id, &document_id), IndexRecordOption::Basic))),
				(Occur::Must, Box::new(TermQuery::new(Term::from_field_text(self.fields.kind, KIND_CHUNK), IndexRecordOption::Basic))),
			];
			writer.delete_query(Box::new(BooleanQuery::new(stale)))?;
		}
		let count = docs.len();
		for (key, doc) in docs {
			writer.delete_term(Term::from_field_text(self.fields.key, &key));
			writer.add_document(doc)?;
		}
		writer.commit()?;
		self.reader.reload()?;
		debug!(count, "committed lexical records");
		Ok(count)
	}

	fn common_fields(&self, doc: &mut TantivyDocument, key: &HitKey, kind: &str, document: &Document) -> Result<()> {
		let f = &self.fields;
		doc.add_text(f.key, record_key(key));
		doc.add_text(f.kind, kind);
		doc.add_text(f.document_id, &document.document_id);
		for c in &document.categories { doc.add_text(f.categories, c); }
		if let Some(y) = document.year() { doc.add_i64(f.year, i64::from(y)); }
		let published = document.published_date.map_or(UNDATED, |d| i64::from(d.num_days_from_ce()));
		doc.add_i64(f.published, published);
		doc.add_text(f.doc_json, serde_json::to_string(document)?);
		Ok(())
	}

	fn document_record(&self, document: &Document) -> Result<(String, TantivyDocument)> {
		let f = &self.fields;
		let key = HitKey::document(document.document_id.clone());
		let mut doc = TantivyDocument::default();
		self.common_fields(&mut doc, &key, KIND_DOCUMENT, document)?;
		doc.add_text(f.title, &document.title);
		if let Some(a) = &document.abstract_text { doc.add_text(f.abstract_text, a); }
		for a in &document.authors { doc.add_text(f.authors, a); }
		Ok((record_key(&key), doc))
	}

	fn chunk_record(&self, document: &Document, chunk: &Chunk) -> Result<(String, TantivyDocument)> {
		let f = &self.fields;
		let key = chunk.key();
		let mut doc = TantivyDocument::default();
		self.common_fields(&mut doc, &key, KIND_CHUNK, document)?;
		doc.add_u64(f.chunk_index, u64::from(chunk.sequence_index));
		doc.add_text(f.text, &chunk.text);
		doc.add_text(f.section, &chunk.section);
		Ok((record_key(&key), doc))
	}
}

#[async_trait]
impl TextIndexer for TantivyIndex {
	async fn index_documents(&self, documents: &[Document]) -> Result<usize> {
		let records = documents.iter().map(|d| self.inner.document_record(d)).collect::<Result<Vec<_>>>()?;
		let inner = Arc::clone(&self.inner);
		tokio::task::spawn_blocking(move || inner.write(records, None)).await?
	}

	async fn index_chunks(&self, document: &Document, chunks: &[Chunk]) -> Result<usize> {
		if let Some(stray) = chunks.iter().find(|c| c.document_id != document.document_id) {
			return Err(anyhow!("chunk {} does not belong to document {}", stray.key(), document.document_id));
		}
		let records = chunks.iter().map(|c| self.inner.chunk_record(document, c)).collect::<Result<Vec<_>>>()?;
		let inner = Arc::clone(&self.inner);
		let document_id = document.document_id.clone();
		tokio::task::spawn_blocking(move || inner.write(records, Some(document_id))).await?
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn record_keys_keep_spaces_apart() {
		let paper = record_key(&HitKey::document("a#0"));
		let chunk = record_key(&HitKey::chunk("a", 0));
		assert_ne!(paper, chunk);
		assert_eq!(chunk, "chunk:a#0");
		assert_ne!(record_key(&HitKey::chunk("a#0", 1)), record_key(&HitKey::chunk("a", 0)));
	}
}
