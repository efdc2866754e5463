use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use scholar_core::config::{Config, Settings};
use scholar_core::types::SearchFilters;
use scholar_embed::embedder_from_settings;
use scholar_hybrid::{HybridSearchEngine, SearchRequest};
use scholar_text::TantivyIndex;
use scholar_vector::{LanceStore, LanceVectorIndex};

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub query: String,

    /// lexical, vector or hybrid.
    #[arg(long, default_value = "hybrid")]
    pub mode: String,

    /// Restrict to a category; repeat to allow several.
    #[arg(long = "category")]
    pub categories: Vec<String>,

    #[arg(long)]
    pub year_from: Option<i32>,

    #[arg(long)]
    pub year_to: Option<i32>,

    #[arg(long)]
    pub size: Option<i64>,

    #[arg(long)]
    pub offset: Option<i64>,

    /// Newest papers first instead of best matches first.
    #[arg(long)]
    pub latest: bool,

    /// Drop hits scoring below this on their retrieval path.
    #[arg(long)]
    pub min_score: Option<f64>,
}

impl SearchArgs {
    fn request(&self) -> SearchRequest {
        SearchRequest {
            query: self.query.clone(),
            mode: Some(self.mode.clone()),
            filters: SearchFilters { categories: self.categories.clone(), year_from: self.year_from, year_to: self.year_to },
            size: self.size,
            offset: self.offset,
            latest_papers: self.latest,
            min_score: self.min_score,
        }
    }
}

pub async fn run(args: SearchArgs, config: &Config, settings: &Settings) -> Result<()> {
    let tantivy_dir = config.resolve_path(&settings.data.tantivy_index_dir);
    let lancedb_dir = config.resolve_path(&settings.data.lancedb_dir);

    let lexical = TantivyIndex::open(&tantivy_dir)?.restricted_to(settings.search.identity_space);
    let store = LanceStore::open(
        &lancedb_dir.to_string_lossy(),
        &settings.data.papers_table,
        &settings.data.chunks_table,
        settings.embedding.dimension,
    )
    .await?;
    let vector = LanceVectorIndex::from_store(&store);
    let embedder = embedder_from_settings(&settings.embedding)?;
    let engine = HybridSearchEngine::new(embedder, Arc::new(lexical), Arc::new(vector), settings.search.clone())?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let response = engine.search_with_cancellation(&args.request(), &token).await.map_err(|e| {
        if e.is_client_error() { anyhow::anyhow!("invalid search request: {e}") } else { anyhow::Error::from(e) }
    })?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SearchArgs,
    }

    #[test]
    fn flags_map_onto_the_wire_request() {
        let harness = Harness::parse_from([
            "scholar", "graph neural networks", "--mode", "lexical", "--category", "cs.LG", "--category", "cs.AI", "--year-from", "2020", "--size", "5",
        ]);
        let request = harness.args.request();
        assert_eq!(request.query, "graph neural networks");
        assert_eq!(request.mode.as_deref(), Some("lexical"));
        assert_eq!(request.filters.categories, vec!["cs.LG".to_string(), "cs.AI".to_string()]);
        assert_eq!(request.filters.year_from, Some(2020));
        assert_eq!(request.filters.year_to, None);
        assert_eq!(request.size, Some(5));
        assert_eq!(request.offset, None);
        assert!(!request.latest_papers);
        assert_eq!(request.min_score, None);
    }

    #[test]
    fn recency_and_floor_flags() {
        let harness = Harness::parse_from(["scholar", "rrf", "--latest", "--min-score", "0.5"]);
        let request = harness.args.request();
        assert!(request.latest_papers);
        assert_eq!(request.min_score, Some(0.5));
        assert_eq!(request.mode.as_deref(), Some("hybrid"));
    }
}
