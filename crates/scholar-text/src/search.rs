use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::ops::Bound;
use std::sync::Arc;
use tantivy::collector::{Collector, SegmentCollector, TopDocs};
use tantivy::query::{BooleanQuery, BoostQuery, ConstScoreQuery, Occur, Query, QueryParser, RangeQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{DocAddress, DocId, Score, SegmentOrdinal, SegmentReader, TantivyDocument, Term};
use tracing::{debug, warn};

use scholar_core::traits::LexicalIndex;
use scholar_core::types::{Chunk, Document, FieldBoost, Hit, HitKey, HitPayload, IdentitySpace, LexicalQuery, RankedHits, ResultOrder, SearchFilters};

use crate::index::{Inner, TantivyIndex};
use crate::tantivy_utils::{Fields, KIND_CHUNK, KIND_DOCUMENT, PUBLISHED, UNDATED};

/// Weight of near-miss spellings relative to exact terms.
const FUZZY_WEIGHT: Score = 0.5;

fn field_for(fields: &Fields, name: &str) -> Result<Field> {
	Ok(match name {
		"title" => fields.title,
		"abstract" => fields.abstract_text,
		"authors" => fields.authors,
		"text" => fields.text,
		"section" => fields.section,
		other => return Err(anyhow!("field '{other}' is not searchable")),
	})
}

fn term_query(term: Term) -> Box<dyn Query> {
	Box::new(TermQuery::new(term, IndexRecordOption::Basic))
}

/// Filters restrict the candidate set without touching BM25 scores.
fn filter_clauses(fields: &Fields, filters: &SearchFilters) -> Vec<(Occur, Box<dyn Query>)> {
	let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
	if filters.is_empty() { return clauses; }
	if !filters.categories.is_empty() {
		let any_category: Vec<(Occur, Box<dyn Query>)> = filters
			.categories
			.iter()
			.map(|c| (Occur::Should, term_query(Term::from_field_text(fields.categories, c))))
			.collect();
		clauses.push((Occur::Must, Box::new(ConstScoreQuery::new(Box::new(BooleanQuery::new(any_category)), 0.0))));
	}
	if filters.year_from.is_some() || filters.year_to.is_some() {
		let bound = |y: Option<i32>| y.map_or(Bound::Unbounded, |y| Bound::Included(Term::from_field_i64(fields.year, i64::from(y))));
		let range = RangeQuery::new(bound(filters.year_from), bound(filters.year_to));
		clauses.push((Occur::Must, Box::new(ConstScoreQuery::new(Box::new(range), 0.0))));
	}
	clauses
}

fn passes(floor: Option<Score>, score: Score) -> bool {
	floor.map_or(true, |min| score >= min)
}

/// Counts matches, or only those reaching `min_score` when one is set.
struct MatchCount {
	min_score: Option<Score>,
}

struct SegmentMatchCount {
	min_score: Option<Score>,
	count: usize,
}

impl Collector for MatchCount {
	type Fruit = usize;
	type Child = SegmentMatchCount;

	fn for_segment(&self, _segment_local_id: SegmentOrdinal, _segment: &SegmentReader) -> tantivy::Result<SegmentMatchCount> {
		Ok(SegmentMatchCount { min_score: self.min_score, count: 0 })
	}

	fn requires_scoring(&self) -> bool {
		self.min_score.is_some()
	}

	fn merge_fruits(&self, segment_counts: Vec<usize>) -> tantivy::Result<usize> {
		Ok(segment_counts.into_iter().sum())
	}
}

impl SegmentCollector for SegmentMatchCount {
	type Fruit = usize;

	fn collect(&mut self, _doc: DocId, score: Score) {
		if passes(self.min_score, score) { self.count += 1; }
	}

	fn harvest(self) -> usize {
		self.count
	}
}

fn stored_str<'a>(doc: &'a TantivyDocument, field: Field) -> Option<&'a str> {
	doc.get_first(field).and_then(|v| v.as_str())
}

impl Inner {
	/// Exact terms scored by BM25, plus a down-weighted fuzzy variant so
	/// near-miss spellings still match without outranking exact hits.
	fn text_query(&self, query: &LexicalQuery) -> Result<Box<dyn Query>> {
		let f = &self.fields;
		let boosts: Vec<(Field, f32)> = query
			.fields
			.iter()
			.map(|FieldBoost { field, boost }| Ok((field_for(f, field)?, *boost)))
			.collect::<Result<_>>()?;
		if boosts.is_empty() { return Err(anyhow!("lexical query names no fields")); }

		let parser_for = |fuzzy: bool| {
			let mut parser = QueryParser::for_index(&self.index, boosts.iter().map(|(field, _)| *field).collect());
			for (field, boost) in &boosts {
				parser.set_field_boost(*field, *boost);
				if fuzzy { parser.set_field_fuzzy(*field, false, query.fuzzy_distance, true); }
			}
			parser
		};
		let (exact, errors) = parser_for(false).parse_query_lenient(&query.text);
		if !errors.is_empty() { debug!(errors = errors.len(), "query parsed leniently"); }
		if query.fuzzy_distance == 0 { return Ok(exact); }

		let (fuzzy, _) = parser_for(true).parse_query_lenient(&query.text);
		Ok(Box::new(BooleanQuery::new(vec![
			(Occur::Should, exact),
			(Occur::Should, Box::new(BoostQuery::new(fuzzy, FUZZY_WEIGHT))),
		])))
	}

	fn search_blocking(&self, query: &LexicalQuery, space: Option<IdentitySpace>) -> Result<RankedHits> {
		let f = &self.fields;
		let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, self.text_query(query)?)];
		clauses.extend(filter_clauses(f, &query.filters));
		if let Some(space) = space {
			let kind = match space { IdentitySpace::Document => KIND_DOCUMENT, IdentitySpace::Chunk => KIND_CHUNK };
			clauses.push((Occur::Must, Box::new(ConstScoreQuery::new(term_query(Term::from_field_text(f.kind, kind)), 0.0))));
		}
		let full = BooleanQuery::new(clauses);

		let searcher = self.reader.searcher();
		let limit = query.size.min(usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX)).max(1);
		let floor = query.min_score;
		let count = MatchCount { min_score: floor };
		let (top_docs, total): (Vec<(Score, DocAddress)>, usize) = match query.order {
			ResultOrder::Relevance => {
				let (top, total) = searcher.search(&full, &(TopDocs::with_limit(limit), count))?;
				// scores arrive descending, so everything under the floor sits at the tail
				(top.into_iter().filter(|(score, _)| passes(floor, *score)).collect(), total)
			}
			ResultOrder::Latest => {
				let newest = TopDocs::with_limit(limit).tweak_score(move |segment: &SegmentReader| {
					let published = segment.fast_fields().i64(PUBLISHED).ok();
					move |doc: DocId, score: Score| {
						let day = published.as_ref().and_then(|column| column.first(doc)).unwrap_or(UNDATED);
						(passes(floor, score), day, score)
					}
				});
				let (top, total) = searcher.search(&full, &(newest, count))?;
				let kept = top.into_iter().filter(|((above, _, _), _)| *above).map(|((_, _, score), address)| (score, address)).collect();
				(kept, total)
			}
		};

		let mut hits = Vec::with_capacity(top_docs.len().min(query.size));
		for (score, address) in top_docs.into_iter().take(query.size) {
			let doc: TantivyDocument = searcher.doc(address)?;
			match self.hit_from_stored(&doc, score) {
				Ok(hit) => hits.push(hit),
				Err(e) => warn!(error = %e, "skipping unreadable lexical record"),
			}
		}
		Ok(RankedHits::new(total, hits))
	}

	fn hit_from_stored(&self, doc: &TantivyDocument, score: f32) -> Result<Hit> {
		let f = &self.fields;
		let json = stored_str(doc, f.doc_json).ok_or_else(|| anyhow!("record has no stored paper"))?;
		let document: Document = serde_json::from_str(json).context("decoding stored paper")?;
		match stored_str(doc, f.kind) {
			Some(KIND_CHUNK) => {
				let sequence = doc.get_first(f.chunk_index).and_then(|v| v.as_u64()).ok_or_else(|| anyhow!("chunk record has no index"))?;
				let sequence = u32::try_from(sequence)?;
				let section = stored_str(doc, f.section).map(str::to_string);
				let text = stored_str(doc, f.text).unwrap_or_default();
				let mut chunk = Chunk::new(document.document_id.clone(), sequence, section, text);
				chunk.lexical_score = Some(score);
				Ok(Hit { key: HitKey::chunk(document.document_id.clone(), sequence), score, payload: HitPayload::Chunk { chunk, document: Some(document) } })
			}
			_ => Ok(Hit { key: HitKey::document(document.document_id.clone()), score, payload: HitPayload::Document(document) }),
		}
	}
}

#[async_trait]
impl LexicalIndex for TantivyIndex {
	async fn search_lexical(&self, query: &LexicalQuery) -> Result<RankedHits> {
		let inner = Arc::clone(&self.inner);
		let space = self.space;
		let query = query.clone();
		tokio::task::spawn_blocking(move || inner.search_blocking(&query, space)).await?
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unknown_field_is_rejected() {
		let index = TantivyIndex::in_memory().unwrap();
		assert!(field_for(&index.inner.fields, "body").is_err());
		assert!(field_for(&index.inner.fields, "abstract").is_ok());
	}

	#[test]
	fn floor_is_inclusive() {
		assert!(passes(None, -1.0));
		assert!(passes(Some(2.0), 2.0));
		assert!(!passes(Some(2.0), 1.99));
	}

	#[test]
	fn empty_filters_add_no_clauses() {
		let index = TantivyIndex::in_memory().unwrap();
		assert!(filter_clauses(&index.inner.fields, &SearchFilters::default()).is_empty());
		let filters = SearchFilters { categories: vec!["cs.IR".into()], year_from: Some(2020), year_to: None };
		assert_eq!(filter_clauses(&index.inner.fields, &filters).len(), 2);
	}
}
