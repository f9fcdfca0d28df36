//! Term postings kept alongside the vectors, for lexical matching when
//! embeddings are unavailable or as a second signal next to them.

use std::collections::{BTreeSet, HashMap};

use contextdb_core::types::{Chunk, ChunkKey};

/// Terms shorter than this are not indexed.
pub const MIN_TERM_CHARS: usize = 4;

/// Whitespace-separated words, lowercased, with leading and trailing
/// punctuation removed.
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
}

fn is_term(word: &str) -> bool {
    word.chars().count() >= MIN_TERM_CHARS
}

#[derive(Debug, Default)]
pub(crate) struct KeywordIndex {
    postings: HashMap<String, BTreeSet<ChunkKey>>,
}

impl KeywordIndex {
    pub(crate) fn add(&mut self, chunk: &Chunk) {
        let key = chunk.key();
        for term in words(&chunk.text).filter(|w| is_term(w)) {
            self.postings.entry(term).or_default().insert(key.clone());
        }
    }

    pub(crate) fn remove(&mut self, chunk: &Chunk) {
        let key = chunk.key();
        for term in words(&chunk.text).filter(|w| is_term(w)) {
            if let Some(keys) = self.postings.get_mut(&term) {
                keys.remove(&key);
                if keys.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
    }

    pub(crate) fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Fraction of query words found in each chunk. Every query word counts
    /// toward the denominator, indexed or not, so scores fall in `(0, 1]`.
    pub(crate) fn score(&self, query: &str) -> HashMap<ChunkKey, f32> {
        let query_words: Vec<String> = words(query).collect();
        let mut hits: HashMap<ChunkKey, usize> = HashMap::new();
        for word in &query_words {
            if let Some(keys) = self.postings.get(word) {
                for key in keys {
                    *hits.entry(key.clone()).or_default() += 1;
                }
            }
        }
        let total = query_words.len() as f32;
        hits.into_iter().map(|(k, n)| (k, n as f32 / total)).collect()
    }
}
