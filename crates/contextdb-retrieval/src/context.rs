//! Rendering ranked results for the downstream reasoning step.

use std::fmt::Write;

use serde::Serialize;

use contextdb_core::types::ResultItem;

const CHARS_PER_TOKEN: usize = 4;
const PREVIEW_CHARS: usize = 100;

/// Rough token estimate used for context budgeting.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / CHARS_PER_TOKEN
}

/// Concatenate results, in order, into one context block. Stops before an
/// item would push the estimate past `max_tokens`; the first item is always
/// included so the consumer never receives an empty context for a
/// non-empty result list.
pub fn build_context(results: &[ResultItem], max_tokens: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for (i, item) in results.iter().enumerate() {
        let tokens = estimate_tokens(&item.chunk.text);
        if i > 0 && used + tokens > max_tokens {
            break;
        }
        let c = &item.chunk;
        let role = if item.is_primary { "match" } else { "context" };
        let _ = writeln!(
            out,
            "[{}] source: {} | chunk {} | bytes {}..{} | score {:.3} | {}",
            i + 1,
            c.document_id,
            c.sequence_index,
            c.start,
            c.end,
            item.final_score,
            role
        );
        out.push_str(c.text.trim());
        out.push_str("\n---\n");
        used += tokens;
    }
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemBreakdown {
    pub document_id: String,
    pub sequence_index: usize,
    pub score: f32,
    pub is_primary: bool,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary {
    pub total_results: usize,
    pub primary_count: usize,
    pub neighbor_count: usize,
    pub top_score: Option<f32>,
    pub average_score: Option<f32>,
    /// Distinct source documents in order of first appearance.
    pub sources: Vec<String>,
    pub items: Vec<ItemBreakdown>,
}

pub fn explain(results: &[ResultItem]) -> ResultSummary {
    let primary_count = results.iter().filter(|r| r.is_primary).count();
    let mut sources: Vec<String> = Vec::new();
    for r in results {
        if !sources.iter().any(|s| *s == r.chunk.document_id) {
            sources.push(r.chunk.document_id.clone());
        }
    }
    let average_score = (!results.is_empty())
        .then(|| results.iter().map(|r| r.final_score).sum::<f32>() / results.len() as f32);
    let top_score = results.iter().map(|r| r.final_score).reduce(f32::max);
    ResultSummary {
        total_results: results.len(),
        primary_count,
        neighbor_count: results.len() - primary_count,
        top_score,
        average_score,
        sources,
        items: results
            .iter()
            .map(|r| ItemBreakdown {
                document_id: r.chunk.document_id.clone(),
                sequence_index: r.chunk.sequence_index,
                score: r.final_score,
                is_primary: r.is_primary,
                preview: preview(&r.chunk.text),
            })
            .collect(),
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contextdb_core::types::Chunk;
    use std::sync::Arc;

    fn item(doc: &str, i: usize, text: &str, score: f32, is_primary: bool) -> ResultItem {
        ResultItem {
            chunk: Arc::new(Chunk { document_id: doc.into(), sequence_index: i, text: text.into(), start: 0, end: text.len() }),
            final_score: score,
            is_primary,
        }
    }

    #[test]
    fn context_respects_budget_but_keeps_first() {
        let long = "x".repeat(400); // 100 tokens
        let results = vec![item("a", 0, &long, 0.9, true), item("a", 1, &long, 0.7, false)];
        let ctx = build_context(&results, 10);
        assert!(ctx.contains("[1] source: a | chunk 0"));
        assert!(!ctx.contains("[2]"));
        let ctx = build_context(&results, 200);
        assert!(ctx.contains("[2] source: a | chunk 1"));
        assert!(ctx.contains("| context"));
    }

    #[test]
    fn explain_counts_and_previews() {
        let long = "é".repeat(150);
        let results = vec![
            item("b", 2, "short", 0.9, true),
            item("a", 0, &long, 0.72, false),
            item("b", 3, "tail", 0.72, false),
        ];
        let s = explain(&results);
        assert_eq!(s.total_results, 3);
        assert_eq!(s.primary_count, 1);
        assert_eq!(s.neighbor_count, 2);
        assert_eq!(s.sources, vec!["b".to_string(), "a".to_string()]);
        assert!((s.top_score.unwrap() - 0.9).abs() < 1e-6);
        assert_eq!(s.items[1].preview.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(s.items[0].preview, "short");
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["items"][0]["is_primary"], true);
    }

    #[test]
    fn explain_empty() {
        let s = explain(&[]);
        assert_eq!(s.total_results, 0);
        assert!(s.top_score.is_none());
        assert!(s.average_score.is_none());
    }
}
