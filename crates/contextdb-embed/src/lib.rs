//! Embedding providers behind the `contextdb_core::traits::Embedder` capability.

use anyhow::{anyhow, Result};
use std::hash::Hasher;
use std::sync::Arc;
use tracing::info;
use twox_hash::XxHash64;

use contextdb_core::config::EmbeddingConfig;
use contextdb_core::traits::Embedder;

pub mod cache;

pub use cache::CachedEmbedder;

/// Deterministic feature-hashing embedder.
///
/// Each whitespace token is lowercased, hashed with xxHash64 and added to one
/// of `dim` buckets; the result is L2-normalized. Texts sharing words end up
/// close in cosine space, which is enough for tests and offline use.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hash:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let weight = 1.0 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += weight;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Resolve the configured provider. Providers are selected by name so the
/// engine itself never depends on a concrete implementation.
pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    config.validate()?;
    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "hash" | "fake" => Arc::new(HashEmbedder::new(config.dim)),
        other => return Err(anyhow!("Unknown embedding provider '{}'", other)),
    };
    info!(provider = %config.provider, dim = config.dim, cache = config.cache, "embedding provider ready");
    if config.cache {
        return Ok(Arc::new(CachedEmbedder::new(embedder)));
    }
    Ok(embedder)
}
