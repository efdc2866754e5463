use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use scholar_core::config::EmbeddingSettings;
use scholar_core::traits::EmbeddingProvider;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

/// Client for an Ollama-compatible `/api/embed` endpoint.
///
/// Texts are sent in batches of `batch_size`. Any failed batch, short
/// response or wrong-dimension vector fails the whole call.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dim: usize,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building embedding http client")?;
        let endpoint = format!("{}/api/embed", settings.url.trim_end_matches('/'));
        info!(endpoint = %endpoint, model = %settings.model, dim = settings.dimension, "embedding client ready");
        Ok(Self { client, endpoint, model: settings.model.clone(), dim: settings.dimension, batch_size: settings.batch_size.max(1) })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { model: &self.model, input: batch })
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("embedding service returned {status}: {body}"));
        }
        let parsed: EmbedResponse = response.json().await.context("decoding embedding response")?;
        if parsed.embeddings.len() != batch.len() {
            return Err(anyhow!("embedding service returned {} vectors for {} inputs", parsed.embeddings.len(), batch.len()));
        }
        if let Some(bad) = parsed.embeddings.iter().find(|v| v.len() != self.dim) {
            return Err(anyhow!("embedding has dimension {}, expected {}", bad.len(), self.dim));
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn dim(&self) -> usize { self.dim }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch).await?);
            debug!(done = out.len(), total = texts.len(), "embedded batch");
        }
        Ok(out)
    }
}
