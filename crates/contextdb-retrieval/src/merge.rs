//! Merging primary matches with their neighbors.
//!
//! One entry per chunk identity. Primaries score their raw similarity;
//! neighbors score `parent score × decay` and keep the best candidate when
//! several primaries reach them. A primary is never demoted to a neighbor.
//! Output is sorted by score descending, then `(document_id, sequence_index)`
//! ascending.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use contextdb_core::types::{rank_order, Chunk, ChunkKey, Match, ResultItem};

pub fn merge<F>(primary: &[Match], mut expand_fn: F, decay_factor: f32) -> Vec<ResultItem>
where
    F: FnMut(&Match) -> Vec<Arc<Chunk>>,
{
    let mut items: HashMap<ChunkKey, ResultItem> = HashMap::with_capacity(primary.len() * 3);

    for m in primary {
        match items.entry(m.chunk.key()) {
            Entry::Occupied(mut e) => {
                let item = e.get_mut();
                item.final_score = item.final_score.max(m.score);
            }
            Entry::Vacant(e) => {
                e.insert(ResultItem::primary(m));
            }
        }
    }

    for m in primary {
        let candidate = m.score * decay_factor;
        for neighbor in expand_fn(m) {
            match items.entry(neighbor.key()) {
                Entry::Occupied(mut e) => {
                    let item = e.get_mut();
                    item.final_score = item.final_score.max(candidate);
                }
                Entry::Vacant(e) => {
                    e.insert(ResultItem { chunk: neighbor, final_score: candidate, is_primary: false });
                }
            }
        }
    }

    let mut merged: Vec<ResultItem> = items.into_values().collect();
    merged.sort_by(|a, b| rank_order(a.final_score, &a.chunk, b.final_score, &b.chunk));
    merged
}
