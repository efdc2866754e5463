use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use scholar_core::chunking::SectionChunker;
use scholar_core::traits::{DocumentStore, EmbeddingProvider, TextIndexer};
use scholar_core::types::{Document, DocumentId};
use scholar_core::{Error, Result};

/// A paper as delivered by the extraction step: metadata plus its full text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    #[serde(flatten)]
    pub document: Document,
    #[serde(default)]
    pub full_text: Option<String>,
}

impl PaperRecord {
    /// Full text when present, otherwise the abstract.
    pub fn body(&self) -> &str {
        self.full_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or(self.document.abstract_text.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub chunks: usize,
}

/// Writes one paper to the store and both indexes.
///
/// Chunks are embedded in a single all-or-nothing call; a failed embedding
/// leaves the paper record stored and lexically indexed but without a new
/// chunk generation.
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    text: Arc<dyn TextIndexer>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: SectionChunker,
}

impl Ingestor {
    pub fn new(store: Arc<dyn DocumentStore>, text: Arc<dyn TextIndexer>, embedder: Arc<dyn EmbeddingProvider>, chunker: SectionChunker) -> Self {
        Self { store, text, embedder, chunker }
    }

    pub async fn ingest(&self, paper: &PaperRecord) -> Result<IngestReport> {
        let document = &paper.document;
        if document.document_id.trim().is_empty() {
            return Err(Error::InvalidRequest("paper has no document_id".into()));
        }
        let document_id = self.store.upsert_document(document).await.map_err(Error::storage)?;
        self.text.index_documents(std::slice::from_ref(document)).await.map_err(Error::storage)?;

        let mut chunks = self.chunker.chunk(&document_id, paper.body());
        if !chunks.is_empty() {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await.map_err(Error::embedding)?;
            if vectors.len() != chunks.len() {
                return Err(Error::embedding(anyhow::anyhow!("got {} embeddings for {} chunks", vectors.len(), chunks.len())));
            }
            for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                chunk.embedding = Some(vector);
            }
        }
        let stored = self.store.insert_chunks(&document_id, &chunks).await.map_err(Error::storage)?;
        self.text.index_chunks(document, &chunks).await.map_err(Error::storage)?;
        debug!(document_id = %document_id, stored, "chunks written");
        info!(document_id = %document_id, chunks = chunks.len(), "ingested paper");
        Ok(IngestReport { document_id, chunks: chunks.len() })
    }
}
