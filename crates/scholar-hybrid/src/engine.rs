use anyhow::anyhow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scholar_core::config::SearchSettings;
use scholar_core::traits::{EmbeddingProvider, LexicalIndex, VectorIndex};
use scholar_core::types::{ExecutedMode, HitPayload, LexicalQuery, RankedHits, ResultOrder, SearchMode, VectorQuery};
use scholar_core::{Error, Result};

use crate::fusion::{project, RankFuser};
use crate::schema::{NormalizedHit, SearchQuery, SearchRequest, SearchResponse};

struct Page {
    total: usize,
    hits: Vec<NormalizedHit>,
    mode: ExecutedMode,
}

fn is_vector_side(e: &Error) -> bool {
    matches!(e, Error::EmbeddingUnavailable { .. } | Error::VectorIndexUnavailable { .. })
}

/// Stable, so equally dated hits keep their relevance order. Undated hits go last.
fn sort_newest_first<T>(items: &mut [T], payload: impl Fn(&T) -> &HitPayload) {
    items.sort_by(|a, b| payload(b).published_date().cmp(&payload(a).published_date()));
}

/// Single entry point for lexical, vector and hybrid retrieval.
///
/// Holds no per-query state; one instance serves any number of concurrent
/// callers. Collaborators are injected so tests can substitute fakes.
pub struct HybridSearchEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    lexical: Arc<dyn LexicalIndex>,
    vector: Arc<dyn VectorIndex>,
    fuser: RankFuser,
    settings: SearchSettings,
}

impl HybridSearchEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        lexical: Arc<dyn LexicalIndex>,
        vector: Arc<dyn VectorIndex>,
        settings: SearchSettings,
    ) -> Result<Self> {
        settings.validate().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let fuser = RankFuser::new(settings.rrf_k).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(Self { embedder, lexical, vector, fuser, settings })
    }

    /// Run one query, bounded by `timeout_ms` when configured.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        match self.settings.timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), self.execute(request))
                .await
                .map_err(|_| Error::Cancelled)?,
            None => self.execute(request).await,
        }
    }

    /// Like [`search`](Self::search), but abandons every in-flight lookup as
    /// soon as `token` is cancelled. No partial result is returned.
    pub async fn search_with_cancellation(&self, request: &SearchRequest, token: &CancellationToken) -> Result<SearchResponse> {
        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled),
            result = self.search(request) => result,
        }
    }

    async fn execute(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let query = SearchQuery::resolve(request, &self.settings)?;
        let page = if query.text.is_empty() {
            Page { total: 0, hits: Vec::new(), mode: query.mode.clean() }
        } else {
            match query.mode {
                SearchMode::Lexical => self.lexical_search(&query).await?,
                SearchMode::Vector => self.vector_search(&query).await?,
                SearchMode::Hybrid => self.hybrid_search(&query).await?,
            }
        };
        let took_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            requested = ?query.mode,
            executed = %page.mode,
            degraded = page.mode.is_degraded(),
            hits = page.hits.len(),
            total = page.total,
            took_ms,
            "search complete"
        );
        Ok(SearchResponse { query: query.text, total: page.total, hits: page.hits, search_mode: page.mode, took_ms })
    }

    async fn lexical_candidates(&self, query: &SearchQuery, fetch: usize) -> Result<RankedHits> {
        let lexical_query = LexicalQuery {
            filters: query.filters.clone(),
            min_score: query.min_score,
            order: query.order,
            fuzzy_distance: self.settings.fuzzy_distance,
            ..LexicalQuery::new(query.text.clone(), self.settings.active_field_boosts().to_vec(), fetch)
        };
        let ranked = self.lexical.search_lexical(&lexical_query).await.map_err(Error::lexical_index)?;
        let hits = project(ranked.hits, self.settings.identity_space)?;
        Ok(RankedHits::new(ranked.total, hits))
    }

    async fn vector_candidates(&self, query: &SearchQuery, k: usize) -> Result<RankedHits> {
        let vector = self
            .embedder
            .embed(std::slice::from_ref(&query.text))
            .await
            .map_err(Error::embedding)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding(anyhow!("embedding service returned no vector")))?;
        let vector_query = VectorQuery { vector, k, filters: query.filters.clone(), min_score: query.min_score };
        let ranked = self.vector.search_vector(&vector_query).await.map_err(Error::vector_index)?;
        let hits = project(ranked.hits, self.settings.identity_space)?;
        Ok(RankedHits::new(hits.len(), hits))
    }

    fn ranked_page(&self, query: &SearchQuery, ranked: &RankedHits, mode: ExecutedMode) -> Page {
        let precision = self.settings.score_precision;
        let hits = ranked
            .hits
            .iter()
            .skip(query.offset)
            .take(query.size)
            .map(|h| NormalizedHit::from_hit(h, precision))
            .collect();
        Page { total: ranked.total, hits, mode }
    }

    async fn lexical_search(&self, query: &SearchQuery) -> Result<Page> {
        let ranked = self.lexical_candidates(query, query.page_end()).await?;
        Ok(self.ranked_page(query, &ranked, ExecutedMode::Lexical))
    }

    async fn vector_search(&self, query: &SearchQuery) -> Result<Page> {
        match self.vector_candidates(query, query.page_end()).await {
            Ok(mut ranked) => {
                if query.order == ResultOrder::Latest {
                    sort_newest_first(&mut ranked.hits, |h| &h.payload);
                }
                Ok(self.ranked_page(query, &ranked, ExecutedMode::Vector))
            }
            Err(e) if is_vector_side(&e) => {
                warn!(error = %e, "vector search failed, falling back to lexical");
                match self.lexical_candidates(query, query.page_end()).await {
                    Ok(ranked) => Ok(self.ranked_page(query, &ranked, ExecutedMode::VectorFallbackLexical)),
                    Err(lexical_error) => {
                        warn!(error = %lexical_error, "lexical fallback failed too");
                        Err(e)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn hybrid_search(&self, query: &SearchQuery) -> Result<Page> {
        let fetch = query.page_end().saturating_mul(self.settings.overfetch_factor);
        let (lexical, vector) = tokio::join!(self.lexical_candidates(query, fetch), self.vector_candidates(query, fetch));
        let lexical = lexical?;
        let vector = match vector {
            Ok(vector) => vector,
            Err(e) if is_vector_side(&e) => {
                warn!(error = %e, "vector side failed, returning lexical results");
                return Ok(self.ranked_page(query, &lexical, ExecutedMode::HybridDowngradedLexical));
            }
            Err(e) => return Err(e),
        };
        debug!(lexical = lexical.hits.len(), vector = vector.hits.len(), "fusing");
        let mut fused = self.fuser.fuse(lexical.hits, vector.hits, usize::MAX)?;
        if query.order == ResultOrder::Latest {
            sort_newest_first(&mut fused, |h| &h.payload);
        }
        let precision = self.settings.score_precision;
        let hits = fused
            .iter()
            .skip(query.offset)
            .take(query.size)
            .map(|h| NormalizedHit::from_fused(h, precision))
            .collect();
        Ok(Page { total: fused.len(), hits, mode: ExecutedMode::Hybrid })
    }
}
