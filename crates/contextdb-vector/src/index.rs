//! Concurrent in-memory vector index.
//!
//! All state sits behind one `RwLock`: searches and lookups share read
//! access, while inserts and removals take the write lock only after their
//! input has been fully validated. A document's chunks therefore become
//! visible (or disappear) all at once, and a reader holding an
//! [`IndexReader`] sees one consistent state for the whole query.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use serde::Serialize;
use tracing::{debug, info};

use contextdb_core::error::{Error, Result};
use contextdb_core::traits::ChunkLookup;
use contextdb_core::types::{rank_order, Chunk, Match};

use crate::keyword::KeywordIndex;
use crate::similarity::{self, Metric};

/// One stored chunk with its embedding. Owned exclusively by the index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Arc<Chunk>,
    pub embedding: Vec<f32>,
    norm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_chunks: usize,
    pub total_documents: usize,
    pub dim: usize,
    pub metric: Metric,
    pub keyword_terms: usize,
}

#[derive(Default)]
struct IndexState {
    documents: HashMap<String, BTreeMap<usize, IndexEntry>>,
    keywords: KeywordIndex,
    len: usize,
}

impl IndexState {
    fn contains(&self, document_id: &str, sequence_index: usize) -> bool {
        self.documents
            .get(document_id)
            .is_some_and(|d| d.contains_key(&sequence_index))
    }

    fn remove(&mut self, document_id: &str) -> usize {
        let Some(doc) = self.documents.remove(document_id) else {
            return 0;
        };
        for entry in doc.values() {
            self.keywords.remove(&entry.chunk);
        }
        self.len -= doc.len();
        doc.len()
    }

    fn put(&mut self, entry: IndexEntry) {
        self.keywords.add(&entry.chunk);
        let doc = self.documents.entry(entry.chunk.document_id.clone()).or_default();
        doc.insert(entry.chunk.sequence_index, entry);
        self.len += 1;
    }
}

pub struct VectorIndex {
    dim: usize,
    metric: Metric,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Cosine-similarity index for vectors of dimension `dim`.
    pub fn new(dim: usize) -> Result<Self> {
        Self::with_metric(dim, Metric::Cosine)
    }

    pub fn with_metric(dim: usize, metric: Metric) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Configuration("index dimension must be at least 1".into()));
        }
        Ok(Self { dim, metric, state: RwLock::new(IndexState::default()) })
    }

    pub fn dim(&self) -> usize { self.dim }
    pub fn metric(&self) -> Metric { self.metric }

    /// A consistent read view; holds the read lock until dropped.
    pub fn snapshot(&self) -> IndexReader<'_> {
        IndexReader {
            state: self.state.read().unwrap_or_else(PoisonError::into_inner),
            dim: self.dim,
            metric: self.metric,
        }
    }

    /// Add a single chunk.
    pub fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        let entry = self.make_entry(chunk, embedding)?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.contains(&entry.chunk.document_id, entry.chunk.sequence_index) {
            return Err(duplicate(&entry.chunk));
        }
        state.put(entry);
        Ok(())
    }

    /// Add all chunks of one document as a single unit: either every entry
    /// becomes visible or, on any error, none does. Sequence indices must be
    /// exactly `0..n` in order.
    pub fn insert_document(&self, document_id: &str, entries: Vec<(Chunk, Vec<f32>)>) -> Result<usize> {
        let prepared = self.prepare_document(document_id, entries)?;
        let count = prepared.len();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = prepared.iter().find(|e| state.contains(document_id, e.chunk.sequence_index)) {
            return Err(duplicate(&e.chunk));
        }
        for entry in prepared {
            state.put(entry);
        }
        drop(state);
        info!(document_id, chunks = count, "indexed document");
        Ok(count)
    }

    /// Swap a document's chunks for a new set in one atomic step.
    pub fn replace_document(&self, document_id: &str, entries: Vec<(Chunk, Vec<f32>)>) -> Result<usize> {
        let prepared = self.prepare_document(document_id, entries)?;
        let count = prepared.len();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let removed = state.remove(document_id);
        for entry in prepared {
            state.put(entry);
        }
        drop(state);
        info!(document_id, removed, chunks = count, "replaced document");
        Ok(count)
    }

    /// Remove every chunk of a document. Absent documents are a no-op.
    pub fn remove_document(&self, document_id: &str) -> usize {
        let removed = self.state.write().unwrap_or_else(PoisonError::into_inner).remove(document_id);
        if removed > 0 {
            info!(document_id, removed, "removed document");
        }
        removed
    }

    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>> {
        self.snapshot().search(query, top_k)
    }

    pub fn keyword_search(&self, query: &str, top_k: usize) -> Result<Vec<Match>> {
        self.snapshot().keyword_search(query, top_k)
    }

    pub fn get(&self, document_id: &str, sequence_index: usize) -> Option<Arc<Chunk>> {
        self.snapshot().get(document_id, sequence_index)
    }

    pub fn max_index(&self, document_id: &str) -> Option<usize> {
        self.snapshot().max_index(document_id)
    }

    pub fn contains_document(&self, document_id: &str) -> bool {
        self.snapshot().contains_document(document_id)
    }

    pub fn len(&self) -> usize { self.snapshot().len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn document_count(&self) -> usize { self.snapshot().document_count() }
    pub fn stats(&self) -> IndexStats { self.snapshot().stats() }

    fn make_entry(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<IndexEntry> {
        check_vector(self.dim, &embedding)?;
        let norm = similarity::l2_norm(&embedding);
        Ok(IndexEntry { chunk: Arc::new(chunk), embedding, norm })
    }

    fn prepare_document(&self, document_id: &str, entries: Vec<(Chunk, Vec<f32>)>) -> Result<Vec<IndexEntry>> {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut prepared = Vec::with_capacity(entries.len());
        for (position, (chunk, embedding)) in entries.into_iter().enumerate() {
            if chunk.document_id != document_id {
                return Err(Error::InvalidArgument(format!(
                    "chunk {}#{} does not belong to document '{}'",
                    chunk.document_id, chunk.sequence_index, document_id
                )));
            }
            if !seen.insert(chunk.sequence_index) {
                return Err(duplicate(&chunk));
            }
            if chunk.sequence_index != position {
                return Err(Error::InvalidArgument(format!(
                    "document '{}' chunk at position {} has sequence_index {}; expected contiguous indices from 0",
                    document_id, position, chunk.sequence_index
                )));
            }
            prepared.push(self.make_entry(chunk, embedding)?);
        }
        Ok(prepared)
    }
}

/// Read view over the index. Every lookup through one reader observes the
/// same index state.
pub struct IndexReader<'a> {
    state: RwLockReadGuard<'a, IndexState>,
    dim: usize,
    metric: Metric,
}

impl IndexReader<'_> {
    /// Top `top_k` matches by similarity, descending; ties are broken by
    /// ascending `(document_id, sequence_index)`.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>> {
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be at least 1".into()));
        }
        check_vector(self.dim, query)?;
        let query_norm = similarity::l2_norm(query);

        let scored: Vec<Match> = self
            .state
            .documents
            .values()
            .flat_map(|doc| doc.values())
            .map(|e| Match { chunk: Arc::clone(&e.chunk), score: self.score(query, query_norm, e) })
            .collect();

        let scored = top_matches(scored, top_k);
        debug!(entries = self.state.len, returned = scored.len(), "vector search");
        Ok(scored)
    }

    /// Top `top_k` chunks by the fraction of query words they contain.
    /// Chunks sharing no word with the query are not returned.
    pub fn keyword_search(&self, query: &str, top_k: usize) -> Result<Vec<Match>> {
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be at least 1".into()));
        }
        let scored: Vec<Match> = self
            .state
            .keywords
            .score(query)
            .into_iter()
            .filter_map(|(key, score)| {
                self.get(&key.document_id, key.sequence_index).map(|chunk| Match { chunk, score })
            })
            .collect();
        let scored = top_matches(scored, top_k);
        debug!(terms = self.state.keywords.term_count(), returned = scored.len(), "keyword search");
        Ok(scored)
    }

    fn score(&self, query: &[f32], query_norm: f64, entry: &IndexEntry) -> f32 {
        match self.metric {
            Metric::Cosine => similarity::cosine(query, query_norm, &entry.embedding, entry.norm),
            Metric::Euclidean => similarity::euclidean(query, &entry.embedding),
        }
    }

    pub fn get(&self, document_id: &str, sequence_index: usize) -> Option<Arc<Chunk>> {
        self.state
            .documents
            .get(document_id)
            .and_then(|d| d.get(&sequence_index))
            .map(|e| Arc::clone(&e.chunk))
    }

    pub fn max_index(&self, document_id: &str) -> Option<usize> {
        self.state
            .documents
            .get(document_id)
            .and_then(|d| d.last_key_value())
            .map(|(k, _)| *k)
    }

    pub fn contains_document(&self, document_id: &str) -> bool {
        self.state.documents.contains_key(document_id)
    }

    /// All chunks of a document in sequence order.
    pub fn document_chunks(&self, document_id: &str) -> Vec<Arc<Chunk>> {
        self.state
            .documents
            .get(document_id)
            .map(|d| d.values().map(|e| Arc::clone(&e.chunk)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize { self.state.len }
    pub fn is_empty(&self) -> bool { self.state.len == 0 }
    pub fn document_count(&self) -> usize { self.state.documents.len() }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_chunks: self.state.len,
            total_documents: self.state.documents.len(),
            dim: self.dim,
            metric: self.metric,
            keyword_terms: self.state.keywords.term_count(),
        }
    }
}

impl ChunkLookup for IndexReader<'_> {
    fn get(&self, document_id: &str, sequence_index: usize) -> Option<Arc<Chunk>> {
        IndexReader::get(self, document_id, sequence_index)
    }
    fn max_index(&self, document_id: &str) -> Option<usize> {
        IndexReader::max_index(self, document_id)
    }
}

impl ChunkLookup for VectorIndex {
    fn get(&self, document_id: &str, sequence_index: usize) -> Option<Arc<Chunk>> {
        VectorIndex::get(self, document_id, sequence_index)
    }
    fn max_index(&self, document_id: &str) -> Option<usize> {
        VectorIndex::max_index(self, document_id)
    }
}

fn top_matches(mut scored: Vec<Match>, top_k: usize) -> Vec<Match> {
    let order = |a: &Match, b: &Match| rank_order(a.score, &a.chunk, b.score, &b.chunk);
    if scored.len() > top_k {
        scored.select_nth_unstable_by(top_k - 1, order);
        scored.truncate(top_k);
    }
    scored.sort_by(order);
    scored
}

fn check_vector(dim: usize, v: &[f32]) -> Result<()> {
    if v.len() != dim {
        return Err(Error::DimensionMismatch { expected: dim, actual: v.len() });
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(Error::InvalidArgument("vector contains NaN or infinite components".into()));
    }
    Ok(())
}

fn duplicate(chunk: &Chunk) -> Error {
    Error::DuplicateChunk { document_id: chunk.document_id.clone(), sequence_index: chunk.sequence_index }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc: &str, i: usize) -> Chunk {
        Chunk { document_id: doc.into(), sequence_index: i, text: format!("{doc}-{i}"), start: 0, end: 0 }
    }

    #[test]
    fn duplicate_insert_is_rejected_and_index_untouched() {
        let index = VectorIndex::new(2).unwrap();
        index.insert(chunk("a", 0), vec![1.0, 0.0]).unwrap();
        let err = index.insert(chunk("a", 0), vec![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, Error::DuplicateChunk { ref document_id, sequence_index: 0 } if document_id == "a"));
        assert_eq!(index.len(), 1);
        let hits = index.search(&[1.0, 0.0], 1).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn insert_document_is_all_or_nothing() {
        let index = VectorIndex::new(2).unwrap();
        let entries = vec![(chunk("a", 0), vec![1.0, 0.0]), (chunk("a", 1), vec![1.0])];
        assert!(matches!(index.insert_document("a", entries), Err(Error::DimensionMismatch { expected: 2, actual: 1 })));
        assert!(index.is_empty());
        assert!(!index.contains_document("a"));
    }

    #[test]
    fn insert_document_requires_contiguous_indices() {
        let index = VectorIndex::new(1).unwrap();
        let gap = vec![(chunk("a", 0), vec![1.0]), (chunk("a", 2), vec![1.0])];
        assert!(matches!(index.insert_document("a", gap), Err(Error::InvalidArgument(_))));
        let foreign = vec![(chunk("b", 0), vec![1.0])];
        assert!(matches!(index.insert_document("a", foreign), Err(Error::InvalidArgument(_))));
        let repeated = vec![(chunk("a", 0), vec![1.0]), (chunk("a", 0), vec![1.0])];
        assert!(matches!(index.insert_document("a", repeated), Err(Error::DuplicateChunk { .. })));
        assert!(index.is_empty());
    }

    #[test]
    fn replace_document_swaps_atomically() {
        let index = VectorIndex::new(1).unwrap();
        index.insert_document("a", (0..3).map(|i| (chunk("a", i), vec![1.0])).collect()).unwrap();
        index.replace_document("a", vec![(chunk("a", 0), vec![1.0])]).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.max_index("a"), Some(0));
    }

    #[test]
    fn non_finite_vectors_are_rejected() {
        let index = VectorIndex::new(2).unwrap();
        assert!(matches!(index.insert(chunk("a", 0), vec![f32::NAN, 0.0]), Err(Error::InvalidArgument(_))));
        assert!(index.search(&[f32::INFINITY, 0.0], 1).is_err());
    }

    #[test]
    fn zero_dimension_is_a_configuration_error() {
        assert!(matches!(VectorIndex::new(0), Err(Error::Configuration(_))));
    }
}
