use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use contextdb_core::config::EmbeddingConfig;
use contextdb_core::traits::Embedder;
use contextdb_embed::{get_default_embedder, CachedEmbedder, HashEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn hash_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder(&EmbeddingConfig { cache: false, ..EmbeddingConfig::default() }).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim follows config");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_words_are_closer() {
    let e = HashEmbedder::new(256);
    let q = e.embed("knee surgery coverage").unwrap();
    let near = e.embed("Coverage for knee surgery is included.").unwrap();
    let far = e.embed("dental cleaning twice yearly").unwrap();
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn empty_text_is_zero_vector() {
    let e = HashEmbedder::new(8);
    let v = e.embed("   ").unwrap();
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn unknown_provider_is_rejected() {
    let config = EmbeddingConfig { provider: "mystery".into(), ..EmbeddingConfig::default() };
    let err = get_default_embedder(&config).err().expect("should fail").to_string();
    assert!(err.contains("mystery"));
}

struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

#[test]
fn cache_only_embeds_unseen_texts() {
    let counting = Arc::new(CountingEmbedder { inner: HashEmbedder::new(16), calls: AtomicUsize::new(0), texts: AtomicUsize::new(0) });
    let cached = CachedEmbedder::new(Arc::clone(&counting));
    assert_eq!(cached.embedder_id(), "cached:hash:d16");

    let first = cached.embed_batch(&["a b".to_string(), "c d".to_string()]).unwrap();
    let second = cached.embed_batch(&["c d".to_string(), "e f".to_string(), "a b".to_string()]).unwrap();

    assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    assert_eq!(counting.texts.load(Ordering::SeqCst), 3);
    assert_eq!(cached.cache_len(), 3);
    assert_eq!(first[0], second[2]);
    assert_eq!(first[1], second[0]);

    cached.embed_batch(&["a b".to_string()]).unwrap();
    assert_eq!(counting.calls.load(Ordering::SeqCst), 2, "full hit skips the provider");
}
