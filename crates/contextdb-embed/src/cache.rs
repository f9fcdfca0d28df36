//! In-process embedding cache keyed by content hash and embedder id.
//!
//! Re-ingesting a document whose chunks did not change skips the provider
//! call entirely. Keys are `blake3(text)`; entries from another embedder id
//! are never mixed because each cache wraps exactly one provider.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use contextdb_core::traits::Embedder;

pub struct CachedEmbedder<E> {
    inner: E,
    id: String,
    entries: Mutex<HashMap<blake3::Hash, Vec<f32>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        let id = format!("cached:{}", inner.embedder_id());
        Self { inner, id, entries: Mutex::new(HashMap::new()) }
    }

    pub fn cache_len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.inner.dim() }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let hashes: Vec<blake3::Hash> = texts.iter().map(|t| blake3::hash(t.as_bytes())).collect();
        let mut out: Vec<Option<Vec<f32>>> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            hashes.iter().map(|h| entries.get(h).cloned()).collect()
        };
        let missing: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
        debug!(hits = texts.len() - missing.len(), misses = missing.len(), "embedding cache lookup");
        if !missing.is_empty() {
            let miss_texts: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.inner.embed_batch(&miss_texts)?;
            if vectors.len() != miss_texts.len() {
                return Err(anyhow!("provider returned {} vectors for {} texts", vectors.len(), miss_texts.len()));
            }
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for (&i, v) in missing.iter().zip(vectors) {
                entries.insert(hashes[i], v.clone());
                out[i] = Some(v);
            }
        }
        out.into_iter()
            .map(|v| v.ok_or_else(|| anyhow!("embedding missing after cache fill")))
            .collect()
    }
}
