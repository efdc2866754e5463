//! scholar-text
//!
//! Tantivy-backed lexical index. `index` writes paper and chunk records,
//! `search` answers BM25 queries with per-field boosts and exact filters.

pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::TantivyIndex;
