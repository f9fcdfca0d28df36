use std::collections::HashMap;

use contextdb_core::types::{rank_order, ChunkKey, Match};

/// Union of two match lists keeping the better score per chunk, ranked and
/// cut to `top_k`.
pub fn fuse(dense: Vec<Match>, lexical: Vec<Match>, top_k: usize) -> Vec<Match> {
    let mut by_key: HashMap<ChunkKey, Match> = HashMap::with_capacity(dense.len() + lexical.len());
    for m in dense.into_iter().chain(lexical) {
        by_key
            .entry(m.chunk.key())
            .and_modify(|old| {
                if m.score > old.score {
                    old.score = m.score;
                }
            })
            .or_insert(m);
    }
    let mut fused: Vec<Match> = by_key.into_values().collect();
    fused.sort_by(|a, b| rank_order(a.score, &a.chunk, b.score, &b.chunk));
    fused.truncate(top_k);
    fused
}
