use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use tracing::debug;

use scholar_core::traits::VectorIndex;
use scholar_core::types::{Chunk, Document, Hit, HitKey, HitPayload, RankedHits, SearchFilters, VectorQuery};

use crate::store::LanceStore;
use crate::table::{distance_column, int_column, sql_literal, string_column};

/// Translate filters into a Lance SQL predicate over the chunk table.
pub fn filter_predicate(filters: &SearchFilters) -> Option<String> {
	if filters.is_empty() { return None; }
	let mut parts = Vec::new();
	if !filters.categories.is_empty() {
		let list = filters.categories.iter().map(|c| sql_literal(c)).collect::<Vec<_>>().join(", ");
		parts.push(format!("array_has_any(categories, [{list}])"));
	}
	if let Some(from) = filters.year_from { parts.push(format!("year >= {from}")); }
	if let Some(to) = filters.year_to { parts.push(format!("year <= {to}")); }
	Some(parts.join(" AND "))
}

/// Cosine k-NN over embedded chunks.
pub struct LanceVectorIndex {
	db: Connection,
	table_name: String,
	dim: usize,
}

impl LanceVectorIndex {
	pub fn new(db: Connection, table_name: &str, dim: usize) -> Self {
		Self { db, table_name: table_name.to_string(), dim }
	}

	pub fn from_store(store: &LanceStore) -> Self {
		Self::new(store.db.clone(), &store.chunks_table, store.dim)
	}
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
	async fn search_vector(&self, query: &VectorQuery) -> Result<RankedHits> {
		if query.vector.len() != self.dim {
			return Err(anyhow!("query vector has dimension {}, expected {}", query.vector.len(), self.dim));
		}
		if query.k == 0 { return Ok(RankedHits::default()); }
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut knn = table.vector_search(query.vector.clone())?.distance_type(DistanceType::Cosine).limit(query.k);
		if let Some(predicate) = filter_predicate(&query.filters) {
			debug!(%predicate, "vector prefilter");
			knn = knn.only_if(predicate);
		}
		let mut stream = knn.execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let ids = string_column(&batch, "document_id")?;
			let seqs = int_column(&batch, "sequence_index")?;
			let sections = string_column(&batch, "section")?;
			let texts = string_column(&batch, "text")?;
			let docs = string_column(&batch, "doc_json")?;
			let distances = distance_column(&batch)?;
			for i in 0..batch.num_rows() {
				let sequence_index = u32::try_from(seqs.value(i))?;
				let document: Document = serde_json::from_str(docs.value(i)).context("decoding stored paper")?;
				let chunk = Chunk::new(ids.value(i), sequence_index, Some(sections.value(i).to_string()), texts.value(i));
				hits.push(Hit {
					key: HitKey::chunk(ids.value(i), sequence_index),
					score: 1.0 - distances.value(i),
					payload: HitPayload::Chunk { chunk, document: Some(document) },
				});
			}
		}
		// lance returns nearest first; keep that order stable across batches
		hits.sort_by(|a, b| b.score.total_cmp(&a.score));
		hits.truncate(query.k);
		if let Some(min) = query.min_score { hits.retain(|h| h.score >= min); }
		Ok(RankedHits::new(hits.len(), hits))
	}
}
