//! scholar-hybrid
//!
//! Hybrid retrieval: reciprocal rank fusion of lexical and vector rankings,
//! the search engine that owns fallback policy, response normalization, and
//! the ingestion coordinator feeding both indexes.

pub mod engine;
pub mod fusion;
pub mod ingest;
pub mod schema;

pub use engine::HybridSearchEngine;
pub use fusion::{FusedHit, RankFuser, DEFAULT_RRF_K};
pub use ingest::{IngestReport, Ingestor, PaperRecord};
pub use schema::{NormalizedHit, SearchQuery, SearchRequest, SearchResponse};
