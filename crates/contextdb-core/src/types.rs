//! Domain types shared by the chunker, the vector index and the retrieval engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a chunk: `(document_id, sequence_index)`.
///
/// Ordering is lexicographic on the document id, then on the sequence
/// index; this is the tie-break order used wherever results are ranked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub document_id: String,
    pub sequence_index: usize,
}

impl ChunkKey {
    pub fn new(document_id: impl Into<String>, sequence_index: usize) -> Self {
        Self { document_id: document_id.into(), sequence_index }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.sequence_index)
    }
}

/// A contiguous segment of a source document that is independently indexed.
///
/// - `document_id`: stable identity of the owning document
/// - `sequence_index`: zero-based position within the document's chunk sequence
/// - `text`: the chunk payload, an exact slice of the source text
/// - `start`/`end`: byte span of `text` within the source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    pub sequence_index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.document_id.clone(), self.sequence_index)
    }
}

/// Transient result of a similarity search.
#[derive(Debug, Clone)]
pub struct Match {
    pub chunk: Arc<Chunk>,
    pub score: f32,
}

/// A ranked, deduplicated item handed to the downstream consumer.
///
/// `is_primary` is true for chunks returned directly by the similarity
/// search and false for chunks pulled in as neighbors.
#[derive(Debug, Clone, Serialize)]
pub struct ResultItem {
    pub chunk: Arc<Chunk>,
    pub final_score: f32,
    pub is_primary: bool,
}

impl ResultItem {
    pub fn primary(m: &Match) -> Self {
        Self { chunk: Arc::clone(&m.chunk), final_score: m.score, is_primary: true }
    }

    pub fn key(&self) -> ChunkKey {
        self.chunk.key()
    }
}

/// Descending score, then ascending `(document_id, sequence_index)`.
pub fn rank_order(a_score: f32, a: &Chunk, b_score: f32, b: &Chunk) -> std::cmp::Ordering {
    b_score
        .total_cmp(&a_score)
        .then_with(|| a.document_id.cmp(&b.document_id))
        .then_with(|| a.sequence_index.cmp(&b.sequence_index))
}
