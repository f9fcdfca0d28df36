use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use contextdb_core::config::{validate_decay_factor, KeywordMode, RetrievalConfig};
use contextdb_core::error::{Error, Result};
use contextdb_core::traits::Embedder;
use contextdb_core::types::{Match, ResultItem};
use contextdb_vector::VectorIndex;

use crate::expand::expand;
use crate::hybrid::fuse;
use crate::merge::merge;
use crate::provider::embed_with_timeout;

/// Per-call retrieval parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveOptions {
    pub top_k: usize,
    pub include_neighbors: bool,
    pub neighbor_range: usize,
    pub decay_factor: f32,
    pub similarity_threshold: Option<f32>,
    pub keyword: KeywordMode,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        RetrieveOptions::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrieveOptions {
    fn from(c: &RetrievalConfig) -> Self {
        Self {
            top_k: c.top_k,
            include_neighbors: c.include_neighbors,
            neighbor_range: c.neighbor_range,
            decay_factor: c.neighbor_decay_factor,
            similarity_threshold: c.similarity_threshold,
            keyword: c.keyword,
        }
    }
}

impl RetrieveOptions {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be at least 1".into()));
        }
        validate_decay_factor(self.decay_factor)?;
        if let Some(t) = self.similarity_threshold {
            if !t.is_finite() {
                return Err(Error::InvalidArgument("similarity_threshold must be finite".into()));
            }
        }
        Ok(())
    }

    fn expands(&self) -> bool {
        self.include_neighbors && self.neighbor_range > 0
    }
}

/// Query-side facade: embed → search (plus keyword matches when enabled)
/// → expand → merge.
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    embed_timeout: Duration,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if embedder.dim() != index.dim() {
            return Err(Error::DimensionMismatch { expected: index.dim(), actual: embedder.dim() });
        }
        let embed_timeout = Duration::from_millis(RetrievalConfig::default().embed_timeout_ms);
        Ok(Self { index, embedder, embed_timeout })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn index(&self) -> &Arc<VectorIndex> { &self.index }

    /// Ranked, deduplicated chunks for a free-text query.
    pub async fn retrieve(&self, query_text: &str, options: &RetrieveOptions) -> Result<Vec<ResultItem>> {
        options.validate()?;
        match self.embed_query(query_text).await {
            Ok(query) => self.rank(Some(&query), Some(query_text), options),
            Err(e) if options.keyword == KeywordMode::Fallback => {
                warn!(error = %e, "embedding failed, answering from keyword matches");
                match self.rank(None, Some(query_text), options) {
                    Err(Error::NoResults(_)) => Err(e),
                    other => other,
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Same as [`Retriever::retrieve`] for an already embedded query.
    /// Search and neighbor lookups run against one index snapshot.
    pub fn retrieve_vector(&self, query: &[f32], options: &RetrieveOptions) -> Result<Vec<ResultItem>> {
        options.validate()?;
        self.rank(Some(query), None, options)
    }

    /// Lexical matches only, best first.
    pub fn keyword_search(&self, query_text: &str, top_k: usize) -> Result<Vec<Match>> {
        self.index.keyword_search(query_text, top_k)
    }

    async fn embed_query(&self, query_text: &str) -> Result<Vec<f32>> {
        let query = embed_with_timeout(Arc::clone(&self.embedder), vec![query_text.to_string()], self.embed_timeout)
            .await?
            .pop()
            .ok_or_else(|| Error::Embedding("provider returned no vector".into()))?;
        if query.len() != self.index.dim() {
            return Err(Error::Embedding(format!(
                "provider returned a {}-dimensional vector, index expects {}",
                query.len(),
                self.index.dim()
            )));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::Embedding("provider returned NaN or infinite components".into()));
        }
        Ok(query)
    }

    fn rank(&self, query: Option<&[f32]>, query_text: Option<&str>, options: &RetrieveOptions) -> Result<Vec<ResultItem>> {
        let snapshot = self.index.snapshot();
        if snapshot.is_empty() {
            return Err(Error::NoResults("the index is empty".into()));
        }
        let passes = |m: &Match| options.similarity_threshold.map_or(true, |t| m.score >= t);

        let mut matches = match query {
            Some(q) => snapshot.search(q, options.top_k)?,
            None => Vec::new(),
        };
        matches.retain(|m| passes(m));
        if let Some(text) = query_text {
            match options.keyword {
                KeywordMode::Off => {}
                KeywordMode::Fallback if matches.is_empty() => {
                    matches = snapshot.keyword_search(text, options.top_k)?;
                    matches.retain(|m| passes(m));
                    debug!(keyword = matches.len(), "keyword fallback");
                }
                KeywordMode::Fallback => {}
                KeywordMode::Hybrid => {
                    let mut lexical = snapshot.keyword_search(text, options.top_k)?;
                    lexical.retain(|m| passes(m));
                    matches = fuse(matches, lexical, options.top_k);
                }
            }
        }
        if matches.is_empty() {
            let reason = match options.similarity_threshold {
                Some(_) => "no chunk passed the similarity threshold",
                None => "no chunk matched the query",
            };
            return Err(Error::NoResults(reason.into()));
        }

        let items = if options.expands() {
            merge(&matches, |m| expand(&snapshot, m, options.neighbor_range), options.decay_factor)
        } else {
            matches.iter().map(ResultItem::primary).collect()
        };
        debug!(primary = matches.len(), returned = items.len(), "retrieval complete");
        Ok(items)
    }
}
