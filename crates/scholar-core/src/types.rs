//! Domain types used by the lexical, vector and hybrid engines.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type DocumentId = String;

/// Section label given to chunks whose heading could not be determined.
pub const UNKNOWN_SECTION: &str = "unknown";

/// A paper record.
///
/// `document_id` is the stable external identifier (e.g. an arXiv id) and is
/// globally unique; re-ingesting the same id updates the record in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub published_date: Option<NaiveDate>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
}

impl Document {
    pub fn year(&self) -> Option<i32> {
        self.published_date.map(|d| d.year())
    }
}

/// A unit of retrievable text belonging to a [`Document`].
///
/// `(document_id, sequence_index)` is unique within an index generation.
/// Chunks are immutable once indexed; re-ingestion supersedes the whole
/// generation of a document's chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: DocumentId,
    pub sequence_index: u32,
    #[serde(default = "default_section")]
    pub section: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f32>,
}

fn default_section() -> String {
    UNKNOWN_SECTION.to_string()
}

impl Chunk {
    pub fn new(document_id: impl Into<DocumentId>, sequence_index: u32, section: Option<String>, text: impl Into<String>) -> Self {
        let section = section.filter(|s| !s.trim().is_empty()).unwrap_or_else(default_section);
        Self { document_id: document_id.into(), sequence_index, section, text: text.into(), embedding: None, lexical_score: None }
    }

    pub fn key(&self) -> HitKey {
        HitKey::Chunk { document_id: self.document_id.clone(), sequence_index: self.sequence_index }
    }
}

/// Identity space a ranked list lives in. One deployment fuses in exactly one space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySpace {
    #[default]
    Document,
    Chunk,
}

impl IdentitySpace {
    /// Lexical fields carried by records of this space.
    pub fn searchable_fields(self) -> &'static [&'static str] {
        match self {
            Self::Document => &["title", "abstract", "authors"],
            Self::Chunk => &["text", "section"],
        }
    }
}

impl fmt::Display for IdentitySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Chunk => f.write_str("chunk"),
        }
    }
}

/// Identity of a hit, used to deduplicate across ranked lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HitKey {
    Document { document_id: DocumentId },
    Chunk { document_id: DocumentId, sequence_index: u32 },
}

impl HitKey {
    pub fn document(document_id: impl Into<DocumentId>) -> Self {
        Self::Document { document_id: document_id.into() }
    }

    pub fn chunk(document_id: impl Into<DocumentId>, sequence_index: u32) -> Self {
        Self::Chunk { document_id: document_id.into(), sequence_index }
    }

    pub fn space(&self) -> IdentitySpace {
        match self {
            Self::Document { .. } => IdentitySpace::Document,
            Self::Chunk { .. } => IdentitySpace::Chunk,
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            Self::Document { document_id } | Self::Chunk { document_id, .. } => document_id,
        }
    }

    pub fn sequence_index(&self) -> Option<u32> {
        match self {
            Self::Document { .. } => None,
            Self::Chunk { sequence_index, .. } => Some(*sequence_index),
        }
    }

    /// Map this key into `space`. A chunk collapses onto its owning document;
    /// a document has no chunk identity and yields `None`.
    pub fn project(&self, space: IdentitySpace) -> Option<HitKey> {
        match (self, space) {
            (Self::Document { .. }, IdentitySpace::Document) | (Self::Chunk { .. }, IdentitySpace::Chunk) => Some(self.clone()),
            (Self::Chunk { document_id, .. }, IdentitySpace::Document) => Some(Self::document(document_id.clone())),
            (Self::Document { .. }, IdentitySpace::Chunk) => None,
        }
    }
}

impl Ord for HitKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.document_id()
            .cmp(other.document_id())
            .then_with(|| self.sequence_index().cmp(&other.sequence_index()))
    }
}

impl PartialOrd for HitKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for HitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document { document_id } => f.write_str(document_id),
            Self::Chunk { document_id, sequence_index } => write!(f, "{document_id}#{sequence_index}"),
        }
    }
}

/// Denormalized fields a retrieval path returns for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HitPayload {
    Document(Document),
    Chunk { chunk: Chunk, document: Option<Document> },
}

impl HitPayload {
    /// The paper behind this hit, when the path returned it.
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Document(d) => Some(d),
            Self::Chunk { document, .. } => document.as_ref(),
        }
    }

    pub fn published_date(&self) -> Option<NaiveDate> {
        self.document().and_then(|d| d.published_date)
    }
}

/// A scored reference returned by one retrieval path.
///
/// `score` is path-specific (BM25 relevance or cosine similarity) and is not
/// comparable across paths. Higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub key: HitKey,
    pub score: f32,
    pub payload: HitPayload,
}

/// A ranked list plus the size of the pool it was cut from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedHits {
    pub total: usize,
    pub hits: Vec<Hit>,
}

impl RankedHits {
    pub fn new(total: usize, hits: Vec<Hit>) -> Self {
        Self { total, hits }
    }
}

/// Retrieval mode requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Lexical,
    Vector,
    #[default]
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexical" | "bm25" => Ok(Self::Lexical),
            "vector" | "knn" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::InvalidRequest(format!("unknown search mode '{other}'"))),
        }
    }
}

impl SearchMode {
    /// The executed mode reported when this mode ran without degradation.
    pub fn clean(self) -> ExecutedMode {
        match self {
            Self::Lexical => ExecutedMode::Lexical,
            Self::Vector => ExecutedMode::Vector,
            Self::Hybrid => ExecutedMode::Hybrid,
        }
    }
}

/// Mode that actually produced a response, including degraded variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutedMode {
    Lexical,
    Vector,
    Hybrid,
    VectorFallbackLexical,
    HybridDowngradedLexical,
}

impl ExecutedMode {
    pub fn is_degraded(self) -> bool {
        matches!(self, Self::VectorFallbackLexical | Self::HybridDowngradedLexical)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
            Self::VectorFallbackLexical => "vector_fallback_lexical",
            Self::HybridDowngradedLexical => "hybrid_downgraded_lexical",
        }
    }
}

impl fmt::Display for ExecutedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical and date-range restrictions shared by both retrieval paths.
///
/// Categories match exactly and are OR'ed; year bounds are inclusive and
/// either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.year_from.is_none() && self.year_to.is_none()
    }

    pub fn matches(&self, categories: &[String], year: Option<i32>) -> bool {
        let category_ok = self.categories.is_empty() || categories.iter().any(|c| self.categories.contains(c));
        let year_ok = match (self.year_from, self.year_to) {
            (None, None) => true,
            (from, to) => year.is_some_and(|y| from.map_or(true, |f| y >= f) && to.map_or(true, |t| y <= t)),
        };
        category_ok && year_ok
    }
}

/// A field name and the weight its matches carry in a multi-field query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBoost {
    pub field: String,
    pub boost: f32,
}

impl FieldBoost {
    pub fn new(field: impl Into<String>, boost: f32) -> Self {
        Self { field: field.into(), boost }
    }
}

/// Title weighted highest, then abstract, then authors.
pub fn default_field_boosts() -> Vec<FieldBoost> {
    vec![FieldBoost::new("title", 3.0), FieldBoost::new("abstract", 2.0), FieldBoost::new("authors", 1.0)]
}

/// Passage text over its section heading.
pub fn default_chunk_field_boosts() -> Vec<FieldBoost> {
    vec![FieldBoost::new("text", 2.0), FieldBoost::new("section", 1.0)]
}

/// How a lexical path orders its matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    #[default]
    Relevance,
    /// Newest `published_date` first, relevance breaking ties. Undated records sort last.
    Latest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalQuery {
    pub text: String,
    pub fields: Vec<FieldBoost>,
    pub filters: SearchFilters,
    pub size: usize,
    /// Matches scoring below this are neither returned nor counted.
    pub min_score: Option<f32>,
    pub order: ResultOrder,
    /// Edit distance tolerated per term; 0 matches terms exactly.
    pub fuzzy_distance: u8,
}

impl LexicalQuery {
    pub fn new(text: impl Into<String>, fields: Vec<FieldBoost>, size: usize) -> Self {
        Self {
            text: text.into(),
            fields,
            filters: SearchFilters::default(),
            size,
            min_score: None,
            order: ResultOrder::Relevance,
            fuzzy_distance: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub k: usize,
    pub filters: SearchFilters,
    /// Neighbours less similar than this are dropped.
    pub min_score: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing_accepts_aliases_and_rejects_unknown() {
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert_eq!("BM25".parse::<SearchMode>().unwrap(), SearchMode::Lexical);
        assert_eq!("knn".parse::<SearchMode>().unwrap(), SearchMode::Vector);
        let err = "semantic".parse::<SearchMode>().unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn chunk_keys_collapse_onto_documents_but_not_back() {
        let chunk = HitKey::chunk("2401.00001", 3);
        assert_eq!(chunk.project(IdentitySpace::Document), Some(HitKey::document("2401.00001")));
        assert_eq!(chunk.project(IdentitySpace::Chunk), Some(chunk.clone()));
        assert_eq!(HitKey::document("2401.00001").project(IdentitySpace::Chunk), None);
    }

    #[test]
    fn key_order_is_document_then_sequence() {
        let mut keys = vec![HitKey::chunk("b", 0), HitKey::chunk("a", 2), HitKey::chunk("a", 1)];
        keys.sort();
        assert_eq!(keys, vec![HitKey::chunk("a", 1), HitKey::chunk("a", 2), HitKey::chunk("b", 0)]);
        assert_eq!(HitKey::chunk("a", 7).to_string(), "a#7");
    }

    #[test]
    fn filters_match_categories_or_and_inclusive_years() {
        let filters = SearchFilters { categories: vec!["cs.LG".into(), "cs.AI".into()], year_from: Some(2020), year_to: Some(2022) };
        assert!(filters.matches(&["cs.AI".into()], Some(2020)));
        assert!(filters.matches(&["stat.ML".into(), "cs.LG".into()], Some(2022)));
        assert!(!filters.matches(&["cs.CV".into()], Some(2021)));
        assert!(!filters.matches(&["cs.AI".into()], Some(2023)));
        assert!(!filters.matches(&["cs.AI".into()], None));
        assert!(SearchFilters::default().matches(&[], None));
    }

    #[test]
    fn payload_exposes_paper_date() {
        let mut paper = Document {
            document_id: "d".into(),
            title: "t".into(),
            authors: vec![],
            abstract_text: None,
            published_date: NaiveDate::from_ymd_opt(2024, 2, 29),
            categories: vec![],
            pdf_url: None,
        };
        assert_eq!(HitPayload::Document(paper.clone()).published_date(), NaiveDate::from_ymd_opt(2024, 2, 29));
        let chunk = Chunk::new("d", 0, None, "x");
        assert_eq!(HitPayload::Chunk { chunk: chunk.clone(), document: None }.published_date(), None);
        paper.published_date = None;
        assert_eq!(HitPayload::Chunk { chunk, document: Some(paper) }.published_date(), None);
    }

    #[test]
    fn missing_section_defaults_to_unknown() {
        assert_eq!(Chunk::new("d", 0, None, "text").section, UNKNOWN_SECTION);
        assert_eq!(Chunk::new("d", 0, Some("  ".into()), "text").section, UNKNOWN_SECTION);
        assert_eq!(Chunk::new("d", 0, Some("METHODS".into()), "text").section, "METHODS");
    }
}
