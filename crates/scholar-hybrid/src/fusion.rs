//! Reciprocal Rank Fusion over two independently ranked hit lists.
//!
//! Each hit at 1-based rank `r` contributes `1 / (k + r)` to its key's fused
//! score. Keys found in both lists accumulate both contributions.

use std::collections::{HashMap, HashSet};

use scholar_core::types::{Hit, HitKey, HitPayload, IdentitySpace};
use scholar_core::{Error, Result};

pub const DEFAULT_RRF_K: f64 = 60.0;

/// One entry of a fused ranking. The first input list is reported as the
/// lexical side and the second as the vector side.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub key: HitKey,
    pub score: f64,
    pub best_raw_score: f32,
    pub lexical_rank: Option<usize>,
    pub vector_rank: Option<usize>,
    pub lexical_score: Option<f32>,
    pub vector_score: Option<f32>,
    pub payload: HitPayload,
}

impl From<FusedHit> for Hit {
    fn from(fused: FusedHit) -> Self {
        Hit { key: fused.key, score: fused.best_raw_score, payload: fused.payload }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankFuser {
    k: f64,
}

impl Default for RankFuser {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}

/// The identity space shared by every key, or the first pair that disagrees.
fn common_space<'a>(keys: impl Iterator<Item = &'a HitKey>) -> Result<Option<IdentitySpace>> {
    let mut space = None;
    for key in keys {
        match space {
            None => space = Some(key.space()),
            Some(left) if left != key.space() => return Err(Error::FusionIdentityMismatch { left, right: key.space() }),
            Some(_) => {}
        }
    }
    Ok(space)
}

impl RankFuser {
    pub fn new(k: f64) -> Result<Self> {
        if !k.is_finite() || k <= 0.0 {
            return Err(Error::InvalidRequest(format!("rrf k must be a positive number, got {k}")));
        }
        Ok(Self { k })
    }

    /// Fuse `first` and `second` into at most `limit` hits.
    ///
    /// Ordering is fused score desc, then best raw score desc, then key asc.
    /// A key's payload comes from the list that scored it higher; on equal
    /// raw scores the first list wins. A key repeated within one list only
    /// counts at its best rank.
    pub fn fuse(&self, first: Vec<Hit>, second: Vec<Hit>, limit: usize) -> Result<Vec<FusedHit>> {
        common_space(first.iter().chain(second.iter()).map(|h| &h.key))?;

        let mut by_key: HashMap<HitKey, FusedHit> = HashMap::with_capacity(first.len() + second.len());
        for (i, hit) in first.into_iter().enumerate() {
            let rank = i + 1;
            let entry = by_key.entry(hit.key.clone()).or_insert_with(|| FusedHit {
                key: hit.key,
                score: 0.0,
                best_raw_score: hit.score,
                lexical_rank: None,
                vector_rank: None,
                lexical_score: None,
                vector_score: None,
                payload: hit.payload,
            });
            if entry.lexical_rank.is_some() { continue; }
            entry.score += self.contribution(rank);
            entry.lexical_rank = Some(rank);
            entry.lexical_score = Some(hit.score);
        }
        for (i, hit) in second.into_iter().enumerate() {
            let rank = i + 1;
            match by_key.get_mut(&hit.key) {
                Some(entry) if entry.vector_rank.is_some() => {}
                Some(entry) => {
                    entry.score += self.contribution(rank);
                    entry.vector_rank = Some(rank);
                    entry.vector_score = Some(hit.score);
                    if hit.score > entry.best_raw_score {
                        entry.best_raw_score = hit.score;
                        entry.payload = hit.payload;
                    }
                }
                None => {
                    let fused = FusedHit {
                        key: hit.key.clone(),
                        score: self.contribution(rank),
                        best_raw_score: hit.score,
                        lexical_rank: None,
                        vector_rank: Some(rank),
                        lexical_score: None,
                        vector_score: Some(hit.score),
                        payload: hit.payload,
                    };
                    by_key.insert(hit.key, fused);
                }
            }
        }

        let mut fused: Vec<FusedHit> = by_key.into_values().collect();
        fused.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.best_raw_score.total_cmp(&a.best_raw_score))
                .then_with(|| a.key.cmp(&b.key))
        });
        fused.truncate(limit);
        Ok(fused)
    }

    fn contribution(&self, rank: usize) -> f64 {
        1.0 / (self.k + rank as f64)
    }
}

/// Map every hit into `space`, keeping list order.
///
/// In document space the best-ranked chunk of each paper stands in for it
/// and later chunks of the same paper are dropped. Document hits have no
/// chunk identity, so projecting them into chunk space fails.
pub fn project(hits: Vec<Hit>, space: IdentitySpace) -> Result<Vec<Hit>> {
    let mut seen = HashSet::with_capacity(hits.len());
    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let key = hit.key.project(space).ok_or(Error::FusionIdentityMismatch { left: space, right: hit.key.space() })?;
        if seen.insert(key.clone()) {
            out.push(Hit { key, ..hit });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_core::types::{Chunk, Document};

    fn doc_hit(id: &str, score: f32) -> Hit {
        let document = Document {
            document_id: id.to_string(),
            title: format!("title of {id}"),
            authors: Vec::new(),
            abstract_text: None,
            published_date: None,
            categories: Vec::new(),
            pdf_url: None,
        };
        Hit { key: HitKey::document(id), score, payload: HitPayload::Document(document) }
    }

    fn chunk_hit(id: &str, seq: u32, score: f32) -> Hit {
        Hit { key: HitKey::chunk(id, seq), score, payload: HitPayload::Chunk { chunk: Chunk::new(id, seq, None, "text"), document: None } }
    }

    fn keys(fused: &[FusedHit]) -> Vec<String> {
        fused.iter().map(|f| f.key.to_string()).collect()
    }

    #[test]
    fn reference_example_orders_by_fused_score() {
        let a = vec![doc_hit("d1", 9.0), doc_hit("d2", 8.0), doc_hit("d3", 7.0)];
        let b = vec![doc_hit("d3", 0.9), doc_hit("d1", 0.8), doc_hit("d4", 0.7)];
        let fused = RankFuser::default().fuse(a, b, 10).unwrap();
        assert_eq!(keys(&fused), ["d1", "d3", "d2", "d4"]);
        assert!((fused[0].score - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-12);
        assert!((fused[1].score - (1.0 / 63.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((fused[2].score - 1.0 / 62.0).abs() < 1e-12);
        assert!((fused[3].score - 1.0 / 63.0).abs() < 1e-12);
        assert_eq!(fused[0].lexical_rank, Some(1));
        assert_eq!(fused[0].vector_rank, Some(2));
        assert_eq!(fused[3].lexical_rank, None);
    }

    #[test]
    fn equal_fused_scores_break_on_raw_score_then_key() {
        let a = vec![doc_hit("x", 1.0), doc_hit("y", 5.0)];
        let b = vec![doc_hit("y", 0.2), doc_hit("x", 0.3)];
        let fused = RankFuser::default().fuse(a, b, 10).unwrap();
        assert_eq!(fused[0].score, fused[1].score);
        assert_eq!(keys(&fused), ["y", "x"]);

        let a = vec![doc_hit("q", 1.0), doc_hit("p", 1.0)];
        let b = vec![doc_hit("p", 1.0), doc_hit("q", 1.0)];
        assert_eq!(keys(&RankFuser::default().fuse(a, b, 10).unwrap()), ["p", "q"]);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let a: Vec<Hit> = (0..50).map(|i| doc_hit(&format!("a{i}"), 50.0 - i as f32)).collect();
        let b: Vec<Hit> = (0..50).map(|i| doc_hit(&format!("a{}", (i * 7) % 60), 1.0 - i as f32 / 100.0)).collect();
        let fuser = RankFuser::new(20.0).unwrap();
        let first = fuser.fuse(a.clone(), b.clone(), 30).unwrap();
        for _ in 0..5 {
            assert_eq!(fuser.fuse(a.clone(), b.clone(), 30).unwrap(), first);
        }
    }

    #[test]
    fn k_changes_the_outcome() {
        // "top" leads one list only; "steady" sits second in both
        let a = vec![doc_hit("top", 3.0), doc_hit("steady", 2.0)];
        let b = vec![doc_hit("other", 3.0), doc_hit("steady", 2.0), doc_hit("filler", 1.5), doc_hit("top", 1.0)];
        let small = RankFuser::new(1.0).unwrap().fuse(a.clone(), b.clone(), 3).unwrap();
        let large = RankFuser::new(60.0).unwrap().fuse(a, b, 3).unwrap();
        assert_eq!(keys(&small)[0], "top");
        assert_eq!(keys(&large)[0], "steady");
    }

    #[test]
    fn refusing_a_fused_list_keeps_its_order() {
        let a = vec![doc_hit("d1", 9.0), doc_hit("d2", 8.0), doc_hit("d3", 7.0), doc_hit("d5", 6.0)];
        let b = vec![doc_hit("d3", 0.9), doc_hit("d1", 0.8), doc_hit("d4", 0.7)];
        let fuser = RankFuser::default();
        let fused: Vec<Hit> = fuser.fuse(a, b, 4).unwrap().into_iter().map(Hit::from).collect();
        let again = fuser.fuse(fused.clone(), fused.clone(), 4).unwrap();
        let order: Vec<String> = fused.iter().map(|h| h.key.to_string()).collect();
        assert_eq!(keys(&again), order);
    }

    #[test]
    fn payload_follows_higher_raw_score() {
        let mut vector_side = chunk_hit("d1", 0, 0.9);
        vector_side.key = HitKey::document("d1");
        let fused = RankFuser::default().fuse(vec![doc_hit("d1", 0.5)], vec![vector_side], 1).unwrap();
        assert!(matches!(fused[0].payload, HitPayload::Chunk { .. }));
        assert_eq!(fused[0].best_raw_score, 0.9);

        let mut tie = chunk_hit("d1", 0, 0.5);
        tie.key = HitKey::document("d1");
        let fused = RankFuser::default().fuse(vec![doc_hit("d1", 0.5)], vec![tie], 1).unwrap();
        assert!(matches!(fused[0].payload, HitPayload::Document(_)));
    }

    #[test]
    fn mixed_identity_spaces_are_rejected() {
        let err = RankFuser::default().fuse(vec![doc_hit("d1", 1.0)], vec![chunk_hit("d1", 0, 1.0)], 5).unwrap_err();
        assert!(matches!(err, Error::FusionIdentityMismatch { left: IdentitySpace::Document, right: IdentitySpace::Chunk }));
    }

    #[test]
    fn limit_truncates_and_zero_or_negative_k_is_invalid() {
        let a = vec![doc_hit("a", 1.0), doc_hit("b", 1.0), doc_hit("c", 1.0)];
        assert_eq!(RankFuser::default().fuse(a, Vec::new(), 2).unwrap().len(), 2);
        assert!(RankFuser::new(0.0).is_err());
        assert!(RankFuser::new(-1.0).is_err());
        assert!(RankFuser::new(f64::NAN).is_err());
    }

    #[test]
    fn duplicate_key_in_one_list_counts_once() {
        let a = vec![doc_hit("a", 2.0), doc_hit("a", 1.0)];
        let fused = RankFuser::default().fuse(a, Vec::new(), 5).unwrap();
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn projection_collapses_chunks_to_their_best_ranked_document() {
        let hits = vec![chunk_hit("a", 3, 0.9), chunk_hit("b", 0, 0.8), chunk_hit("a", 1, 0.7)];
        let projected = project(hits, IdentitySpace::Document).unwrap();
        let keys: Vec<String> = projected.iter().map(|h| h.key.to_string()).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(projected[0].score, 0.9);
        assert!(project(vec![doc_hit("a", 1.0)], IdentitySpace::Chunk).is_err());
    }
}
