//! scholar-embed
//!
//! Embedding providers: an HTTP client for an Ollama-style embedding service
//! and a deterministic hashing embedder for tests and offline development.

use anyhow::Result;
use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::info;
use twox_hash::XxHash64;

use scholar_core::config::EmbeddingSettings;
use scholar_core::traits::EmbeddingProvider;

pub mod ollama;

pub use ollama::OllamaEmbedder;

/// Token-hashing embedder. Same text always yields the same L2-normalized
/// vector; texts sharing tokens land close together.
pub struct HashEmbedder { dim: usize }

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            let val = f32::from(u16::try_from(h >> 48).unwrap_or(u16::MAX)) / f32::from(u16::MAX);
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dim(&self) -> usize { self.dim }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn fake_requested(settings: &EmbeddingSettings) -> bool {
    settings.fake
        || std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Build the provider selected by configuration.
///
/// Respects `APP_USE_FAKE_EMBEDDINGS=1` in addition to `embedding.fake`.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    if fake_requested(settings) {
        info!(dim = settings.dimension, "using hash embedder");
        return Ok(Arc::new(HashEmbedder::new(settings.dimension)));
    }
    Ok(Arc::new(OllamaEmbedder::new(settings)?))
}
