use std::sync::Arc;

use contextdb_core::traits::ChunkLookup;
use contextdb_core::types::{Chunk, Match};

/// Chunks within `range` positions of the match in the same document, in
/// ascending sequence order, excluding the matched chunk itself. Positions
/// outside `[0, max_index]` are skipped; `range == 0` yields nothing.
pub fn expand<L: ChunkLookup + ?Sized>(lookup: &L, m: &Match, range: usize) -> Vec<Arc<Chunk>> {
    if range == 0 {
        return Vec::new();
    }
    let doc = m.chunk.document_id.as_str();
    let Some(max_index) = lookup.max_index(doc) else {
        return Vec::new();
    };
    let center = m.chunk.sequence_index;
    let lo = center.saturating_sub(range);
    let hi = center.saturating_add(range).min(max_index);
    (lo..=hi)
        .filter(|&i| i != center)
        .filter_map(|i| lookup.get(doc, i))
        .collect()
}
