//! Wire request and response shapes, and the mapping from ranked hits into
//! one uniform hit record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use scholar_core::config::SearchSettings;
use scholar_core::types::{Document, ExecutedMode, Hit, HitPayload, ResultOrder, SearchFilters, SearchMode};
use scholar_core::{Error, Result};

use crate::fusion::FusedHit;

/// A search request as it arrives from a caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    /// Order results by publication date, newest first.
    #[serde(default)]
    pub latest_papers: bool,
    /// Drop hits whose raw path score is below this.
    #[serde(default)]
    pub min_score: Option<f64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Self::default() }
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn latest_papers(mut self) -> Self {
        self.latest_papers = true;
        self
    }

    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// A validated request. Built once at the boundary; the engine never looks
/// at the raw strings again.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub mode: SearchMode,
    pub filters: SearchFilters,
    pub size: usize,
    pub offset: usize,
    pub order: ResultOrder,
    pub min_score: Option<f32>,
}

impl SearchQuery {
    pub fn resolve(request: &SearchRequest, settings: &SearchSettings) -> Result<Self> {
        let mode = match request.mode.as_deref() {
            None => SearchMode::default(),
            Some(m) => m.parse()?,
        };
        let size = match request.size {
            None => settings.default_size,
            Some(s) if s <= 0 => return Err(Error::InvalidRequest(format!("size must be positive, got {s}"))),
            Some(s) => usize::try_from(s).unwrap_or(usize::MAX),
        }
        .min(settings.max_size);
        let offset = match request.offset {
            None => 0,
            Some(o) if o < 0 => return Err(Error::InvalidRequest(format!("offset must not be negative, got {o}"))),
            Some(o) => usize::try_from(o).unwrap_or(usize::MAX),
        };
        if let (Some(from), Some(to)) = (request.filters.year_from, request.filters.year_to) {
            if from > to {
                return Err(Error::InvalidRequest(format!("year_from {from} is after year_to {to}")));
            }
        }
        let min_score = match request.min_score {
            Some(m) if !m.is_finite() => return Err(Error::InvalidRequest(format!("min_score must be a finite number, got {m}"))),
            Some(m) => Some(m as f32),
            None => None,
        };
        let order = if request.latest_papers { ResultOrder::Latest } else { ResultOrder::Relevance };
        Ok(Self { text: request.query.trim().to_string(), mode, filters: request.filters.clone(), size, offset, order, min_score })
    }

    /// Index of the last hit this page needs, counting from the top.
    pub fn page_end(&self) -> usize {
        self.offset.saturating_add(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHit {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_text: Option<String>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub hits: Vec<NormalizedHit>,
    pub search_mode: ExecutedMode,
    pub took_ms: u64,
}

pub fn round_score(score: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(i32::try_from(precision.min(12)).unwrap_or(12));
    (score * factor).round() / factor
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn non_empty_all(values: &[String]) -> Vec<String> {
    values.iter().filter_map(|v| non_empty(v)).collect()
}

impl NormalizedHit {
    fn from_payload(document_id: &str, payload: &HitPayload, score: f64, original_score: Option<f64>) -> Self {
        let (document, chunk) = match payload {
            HitPayload::Document(d) => (Some(d), None),
            HitPayload::Chunk { chunk, document } => (document.as_ref(), Some(chunk)),
        };
        let mut hit = Self {
            document_id: document_id.to_string(),
            chunk_index: chunk.map(|c| c.sequence_index),
            title: None,
            authors: Vec::new(),
            abstract_text: None,
            published_date: None,
            categories: Vec::new(),
            pdf_url: None,
            section: chunk.and_then(|c| non_empty(&c.section)),
            chunk_text: chunk.and_then(|c| non_empty(&c.text)),
            score,
            original_score,
        };
        if let Some(Document { title, authors, abstract_text, published_date, categories, pdf_url, .. }) = document {
            hit.title = non_empty(title);
            hit.authors = non_empty_all(authors);
            hit.abstract_text = abstract_text.as_deref().and_then(non_empty);
            hit.published_date = *published_date;
            hit.categories = non_empty_all(categories);
            hit.pdf_url = pdf_url.as_deref().and_then(non_empty);
        }
        hit
    }

    /// A hit straight from one retrieval path; its raw score is echoed.
    pub fn from_hit(hit: &Hit, precision: u32) -> Self {
        Self::from_payload(hit.key.document_id(), &hit.payload, round_score(f64::from(hit.score), precision), None)
    }

    /// A fused hit: `score` is the RRF score, `original_score` the best raw score.
    pub fn from_fused(hit: &FusedHit, precision: u32) -> Self {
        let original = round_score(f64::from(hit.best_raw_score), precision);
        Self::from_payload(hit.key.document_id(), &hit.payload, round_score(hit.score, precision), Some(original))
    }
}
