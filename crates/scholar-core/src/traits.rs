//! Seams between the engine and its external collaborators.
//!
//! Implementations report failures as `anyhow::Error`; the hybrid engine
//! decides which of them are recoverable.

use async_trait::async_trait;

use crate::types::{Chunk, Document, DocumentId, LexicalQuery, RankedHits, VectorQuery};

/// Turns text into fixed-length vectors.
///
/// Output order matches input order. A call either returns one vector per
/// input or fails as a whole.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn search_lexical(&self, query: &LexicalQuery) -> anyhow::Result<RankedHits>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Hits are ordered by cosine similarity, best first.
    async fn search_vector(&self, query: &VectorQuery) -> anyhow::Result<RankedHits>;
}

/// Write side of the lexical index, used during ingestion.
#[async_trait]
pub trait TextIndexer: Send + Sync {
    async fn index_documents(&self, documents: &[Document]) -> anyhow::Result<usize>;
    async fn index_chunks(&self, document: &Document, chunks: &[Chunk]) -> anyhow::Result<usize>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or update the record keyed by `document_id`.
    async fn upsert_document(&self, document: &Document) -> anyhow::Result<DocumentId>;
    /// Replace the document's chunk generation. Every chunk must carry an embedding.
    async fn insert_chunks(&self, document_id: &str, chunks: &[Chunk]) -> anyhow::Result<usize>;
}
