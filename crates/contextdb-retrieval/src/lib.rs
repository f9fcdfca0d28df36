//! contextdb-retrieval
//!
//! Context-aware retrieval over a `VectorIndex`: similarity search with an
//! optional keyword signal, neighbor expansion, deduplicating merge and score
//! composition, plus the ingestion pipeline that fills the index.
//! `ContextEngine` wires the pieces from `Settings`; the component types stay
//! usable on their own.

use std::sync::Arc;
use std::time::Duration;

use contextdb_core::chunker::Chunker;
use contextdb_core::config::Settings;
use contextdb_core::error::Result;
use contextdb_core::traits::Embedder;
use contextdb_core::types::ResultItem;
use contextdb_vector::VectorIndex;

pub mod context;
pub mod expand;
pub mod hybrid;
pub mod ingest;
pub mod merge;
pub mod provider;
pub mod retriever;

pub use context::{build_context, explain, ResultSummary};
pub use expand::expand;
pub use hybrid::fuse;
pub use ingest::Ingestor;
pub use merge::merge;
pub use retriever::{RetrieveOptions, Retriever};

pub struct ContextEngine {
    index: Arc<VectorIndex>,
    ingestor: Ingestor,
    retriever: Retriever,
    defaults: RetrieveOptions,
}

impl ContextEngine {
    /// Fresh index sized to the configured provider.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        settings.validate()?;
        let embedder = contextdb_embed::get_default_embedder(&settings.embedding)?;
        let index = Arc::new(VectorIndex::new(embedder.dim())?);
        Ok(Self::new(index, embedder, settings)?)
    }

    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_millis(settings.retrieval.embed_timeout_ms);
        let chunker = Chunker::new(&settings.chunking)?;
        let ingestor = Ingestor::new(Arc::clone(&index), Arc::clone(&embedder), chunker)?.with_timeout(timeout);
        let retriever = Retriever::new(Arc::clone(&index), embedder)?.with_timeout(timeout);
        Ok(Self { index, ingestor, retriever, defaults: RetrieveOptions::from(&settings.retrieval) })
    }

    pub fn index(&self) -> &Arc<VectorIndex> { &self.index }
    pub fn ingestor(&self) -> &Ingestor { &self.ingestor }
    pub fn retriever(&self) -> &Retriever { &self.retriever }
    pub fn default_options(&self) -> &RetrieveOptions { &self.defaults }

    pub async fn ingest(&self, document_id: &str, text: &str) -> Result<usize> {
        self.ingestor.ingest(document_id, text).await
    }

    /// Retrieve with the configured defaults.
    pub async fn query(&self, query_text: &str) -> Result<Vec<ResultItem>> {
        self.retriever.retrieve(query_text, &self.defaults).await
    }

    pub async fn query_with(&self, query_text: &str, options: &RetrieveOptions) -> Result<Vec<ResultItem>> {
        self.retriever.retrieve(query_text, options).await
    }
}
