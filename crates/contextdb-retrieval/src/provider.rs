use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use contextdb_core::error::{Error, Result};
use contextdb_core::traits::Embedder;

/// Run a provider batch call on the blocking pool, bounded by `timeout`.
///
/// Every failure mode (provider error, panic, timeout, wrong vector count)
/// surfaces as `Error::Embedding`. Dimensionality is left to the caller since
/// queries and ingestion report it differently.
pub async fn embed_with_timeout(
    embedder: Arc<dyn Embedder>,
    texts: Vec<String>,
    timeout: Duration,
) -> Result<Vec<Vec<f32>>> {
    let expected = texts.len();
    let task = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts));
    let vectors = match tokio::time::timeout(timeout, task).await {
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "embedding call timed out");
            return Err(Error::Embedding(format!("provider did not answer within {} ms", timeout.as_millis())));
        }
        Ok(Err(join)) => return Err(Error::Embedding(format!("provider task failed: {join}"))),
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "embedding provider failed");
            return Err(Error::Embedding(format!("{e:#}")));
        }
        Ok(Ok(Ok(vectors))) => vectors,
    };
    if vectors.len() != expected {
        return Err(Error::Embedding(format!("provider returned {} vectors for {} texts", vectors.len(), expected)));
    }
    Ok(vectors)
}
