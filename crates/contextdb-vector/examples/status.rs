use std::path::PathBuf;

use contextdb_core::chunker::Chunker;
use contextdb_core::config::ChunkingConfig;
use contextdb_core::loader::load_text_documents;
use contextdb_core::traits::Embedder;
use contextdb_embed::HashEmbedder;
use contextdb_vector::VectorIndex;

fn main() -> anyhow::Result<()> {
    let dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data/txt"));
    let embedder = HashEmbedder::new(384);
    let chunker = Chunker::new(&ChunkingConfig::default())?;
    let index = VectorIndex::new(embedder.dim())?;
    for doc in load_text_documents(&dir)? {
        let chunks = chunker.chunk(&doc.document_id, &doc.text);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        index.insert_document(&doc.document_id, chunks.into_iter().zip(vectors).collect())?;
    }
    let stats = index.stats();
    println!("documents={} chunks={} dim={} metric={:?}", stats.total_documents, stats.total_chunks, stats.dim, stats.metric);
    Ok(())
}
