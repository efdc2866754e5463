#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scholar_core::config::SearchSettings;
use scholar_core::traits::{EmbeddingProvider, LexicalIndex, VectorIndex};
use chrono::NaiveDate;

use scholar_core::types::{Chunk, Document, Hit, HitKey, HitPayload, LexicalQuery, RankedHits, ResultOrder, SearchFilters, VectorQuery};
use scholar_hybrid::HybridSearchEngine;

pub fn document(id: &str) -> Document {
    Document {
        document_id: id.to_string(),
        title: format!("Paper {id}"),
        authors: vec!["Yoshua Bengio".to_string()],
        abstract_text: Some(format!("Abstract of {id}")),
        published_date: None,
        categories: vec!["cs.LG".to_string()],
        pdf_url: None,
    }
}

pub fn doc_hit(id: &str, score: f32) -> Hit {
    Hit { key: HitKey::document(id), score, payload: HitPayload::Document(document(id)) }
}

/// A document hit with its own category and publication date.
pub fn dated_hit(id: &str, score: f32, category: &str, date: Option<NaiveDate>) -> Hit {
    let mut paper = document(id);
    paper.categories = vec![category.to_string()];
    paper.published_date = date;
    Hit { key: HitKey::document(id), score, payload: HitPayload::Document(paper) }
}

pub fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// What a real index would return for these restrictions: filtered, floored
/// and, for `Latest`, newest first.
fn admitted(hits: &[Hit], filters: &SearchFilters, min_score: Option<f32>, order: ResultOrder) -> Vec<Hit> {
    let mut kept: Vec<Hit> = hits
        .iter()
        .filter(|h| {
            let paper = h.payload.document();
            let categories = paper.map(|d| d.categories.as_slice()).unwrap_or_default();
            filters.matches(categories, paper.and_then(Document::year))
        })
        .filter(|h| min_score.map_or(true, |m| h.score >= m))
        .cloned()
        .collect();
    if order == ResultOrder::Latest {
        kept.sort_by(|a, b| b.payload.published_date().cmp(&a.payload.published_date()));
    }
    kept
}

pub fn chunk_hit(id: &str, seq: u32, score: f32) -> Hit {
    let chunk = Chunk::new(id, seq, Some("RESULTS".into()), format!("passage {seq} of {id}"));
    Hit { key: HitKey::chunk(id, seq), score, payload: HitPayload::Chunk { chunk, document: Some(document(id)) } }
}

/// Scripted behaviour shared by the fake collaborators.
#[derive(Default)]
pub struct Script {
    pub calls: AtomicUsize,
    pub sizes: Mutex<Vec<usize>>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl Script {
    async fn enter(&self, size: usize, what: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sizes.lock().unwrap().push(size);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail {
            return Err(anyhow!("{what} is down"));
        }
        Ok(())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_size(&self) -> Option<usize> {
        self.sizes.lock().unwrap().last().copied()
    }
}

#[derive(Default)]
pub struct FakeEmbedder {
    pub script: Script,
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn dim(&self) -> usize {
        3
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.script.enter(texts.len(), "embedding service").await?;
        Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect())
    }
}

#[derive(Default)]
pub struct FakeLexical {
    pub hits: Vec<Hit>,
    pub script: Script,
    pub seen: Mutex<Vec<LexicalQuery>>,
}

impl FakeLexical {
    pub fn last_query(&self) -> Option<LexicalQuery> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LexicalIndex for FakeLexical {
    async fn search_lexical(&self, query: &LexicalQuery) -> Result<RankedHits> {
        self.seen.lock().unwrap().push(query.clone());
        self.script.enter(query.size, "lexical index").await?;
        let matched = admitted(&self.hits, &query.filters, query.min_score, query.order);
        Ok(RankedHits::new(matched.len(), matched.into_iter().take(query.size).collect()))
    }
}

#[derive(Default)]
pub struct FakeVector {
    pub hits: Vec<Hit>,
    pub script: Script,
    pub seen: Mutex<Vec<VectorQuery>>,
}

impl FakeVector {
    pub fn last_query(&self) -> Option<VectorQuery> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl VectorIndex for FakeVector {
    async fn search_vector(&self, query: &VectorQuery) -> Result<RankedHits> {
        self.seen.lock().unwrap().push(query.clone());
        self.script.enter(query.k, "vector index").await?;
        let hits: Vec<Hit> = admitted(&self.hits, &query.filters, query.min_score, ResultOrder::Relevance).into_iter().take(query.k).collect();
        Ok(RankedHits::new(hits.len(), hits))
    }
}

pub struct Rig {
    pub embedder: Arc<FakeEmbedder>,
    pub lexical: Arc<FakeLexical>,
    pub vector: Arc<FakeVector>,
    pub engine: HybridSearchEngine,
}

pub fn rig(embedder: FakeEmbedder, lexical: FakeLexical, vector: FakeVector, settings: SearchSettings) -> Rig {
    let embedder = Arc::new(embedder);
    let lexical = Arc::new(lexical);
    let vector = Arc::new(vector);
    let engine = HybridSearchEngine::new(embedder.clone(), lexical.clone(), vector.clone(), settings).unwrap();
    Rig { embedder, lexical, vector, engine }
}

pub fn failing() -> Script {
    Script { fail: true, ..Script::default() }
}

pub fn slow(delay: Duration) -> Script {
    Script { delay: Some(delay), ..Script::default() }
}

/// Eight lexical documents `l1..l8`, with `l2`, `l5` and `l7` also found by
/// the vector side among six chunks.
pub fn scenario_hits() -> (Vec<Hit>, Vec<Hit>) {
    let lexical = (1..=8).map(|i| doc_hit(&format!("l{i}"), 20.0 - i as f32)).collect();
    let vector = vec![
        chunk_hit("v1", 0, 0.95),
        chunk_hit("l5", 2, 0.91),
        chunk_hit("v2", 1, 0.90),
        chunk_hit("l2", 0, 0.85),
        chunk_hit("v3", 4, 0.80),
        chunk_hit("l7", 3, 0.75),
    ];
    (lexical, vector)
}
