use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use contextdb_core::chunker::Chunker;
use contextdb_core::error::{Error, Result};
use contextdb_core::traits::Embedder;
use contextdb_core::types::Chunk;
use contextdb_vector::VectorIndex;

use crate::provider::embed_with_timeout;

/// Build-side pipeline: chunk → embed → insert, one document at a time.
pub struct Ingestor {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    embed_timeout: Duration,
}

impl Ingestor {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, chunker: Chunker) -> Result<Self> {
        if embedder.dim() != index.dim() {
            return Err(Error::DimensionMismatch { expected: index.dim(), actual: embedder.dim() });
        }
        Ok(Self { index, embedder, chunker, embed_timeout: Duration::from_secs(60) })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Index a new document. Fails with `DuplicateChunk` if any chunk of it is
    /// already present.
    pub async fn ingest(&self, document_id: &str, text: &str) -> Result<usize> {
        let existing = self.index.snapshot().document_chunks(document_id).first().map(|c| c.sequence_index);
        if let Some(sequence_index) = existing {
            return Err(Error::DuplicateChunk { document_id: document_id.to_string(), sequence_index });
        }
        let Some(entries) = self.embed_document(document_id, text).await? else {
            return Ok(0);
        };
        self.index.insert_document(document_id, entries)
    }

    /// Index a document, atomically replacing any previous version of it.
    pub async fn reingest(&self, document_id: &str, text: &str) -> Result<usize> {
        let entries = self.embed_document(document_id, text).await?.unwrap_or_default();
        self.index.replace_document(document_id, entries)
    }

    pub fn remove(&self, document_id: &str) -> usize {
        self.index.remove_document(document_id)
    }

    async fn embed_document(&self, document_id: &str, text: &str) -> Result<Option<Vec<(Chunk, Vec<f32>)>>> {
        let chunks = self.chunker.chunk(document_id, text);
        if chunks.is_empty() {
            info!(document_id, "document has no content, nothing to index");
            return Ok(None);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_with_timeout(Arc::clone(&self.embedder), texts, self.embed_timeout).await?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.index.dim()) {
            return Err(Error::DimensionMismatch { expected: self.index.dim(), actual: bad.len() });
        }
        debug!(document_id, chunks = chunks.len(), "embedded document");
        Ok(Some(chunks.into_iter().zip(vectors).collect()))
    }
}
