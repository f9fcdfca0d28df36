use std::sync::Arc;

use crate::types::Chunk;

/// The external embedding capability: `embed(text) -> vector` of fixed dimension.
///
/// Provider selection happens outside the engine; implementations must return
/// vectors of length `dim()` for every input.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("provider returned no vector"))
    }
}

impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}

/// Exact chunk lookup by identity, used for neighbor expansion.
pub trait ChunkLookup {
    fn get(&self, document_id: &str, sequence_index: usize) -> Option<Arc<Chunk>>;
    /// Highest sequence index stored for the document, `None` if absent.
    fn max_index(&self, document_id: &str) -> Option<usize>;
}
