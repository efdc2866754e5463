use scholar_core::config::EmbeddingSettings;
use scholar_core::traits::EmbeddingProvider;
use scholar_embed::{embedder_from_settings, HashEmbedder};

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { fake: true, dimension: 768, ..EmbeddingSettings::default() };
    let embedder = embedder_from_settings(&settings).expect("embedder");
    assert_eq!(embedder.dim(), 768);

    let texts = vec!["graph neural networks".to_string(), "graph neural networks".to_string()];
    let embs = embedder.embed(&texts).await.expect("embed");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 768, "embedding dim is 768");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_tokens_are_closer_than_disjoint_ones() {
    let e = HashEmbedder::new(256);
    let cos = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let q = e.embed_text("graph neural networks");
    let near = e.embed_text("neural networks on graph data");
    let far = e.embed_text("protein folding kinetics");
    assert!(cos(&q, &near) > cos(&q, &far));
}

#[tokio::test]
async fn empty_batch_yields_no_vectors() {
    let e = HashEmbedder::new(8);
    let out = EmbeddingProvider::embed(&e, &[]).await.expect("embed");
    assert!(out.is_empty());
}
