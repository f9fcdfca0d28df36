use std::sync::Arc;
use std::thread;

use contextdb_core::chunker::chunk;
use contextdb_core::error::Error;
use contextdb_core::traits::Embedder;
use contextdb_core::types::Chunk;
use contextdb_embed::HashEmbedder;
use contextdb_vector::{Metric, VectorIndex};

const POLICY: &str = "Knee surgery is covered after a ninety day waiting period. \
Dental cleaning is covered twice per year. Emergency room visits require no referral. \
Maternity care is covered after twelve months of continuous coverage.";

fn index_text(index: &VectorIndex, embedder: &HashEmbedder, doc: &str, text: &str) -> usize {
    let chunks = chunk(doc, text, 60, 10).expect("chunk");
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).expect("embed");
    index.insert_document(doc, chunks.into_iter().zip(vectors).collect()).expect("insert")
}

fn unit(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot] = 1.0;
    v
}

fn chunk_at(doc: &str, i: usize) -> Chunk {
    Chunk { document_id: doc.into(), sequence_index: i, text: format!("{doc} part {i}"), start: 0, end: 0 }
}

#[test]
fn chunk_embed_index_search() {
    let embedder = HashEmbedder::new(256);
    let index = VectorIndex::new(256).expect("index");
    let n = index_text(&index, &embedder, "policy.txt", POLICY);
    assert!(n > 2);
    assert_eq!(index.len(), n);
    assert_eq!(index.max_index("policy.txt"), Some(n - 1));

    let q = embedder.embed("knee surgery waiting period").expect("embed");
    let hits = index.search(&q, 3).expect("search");
    assert_eq!(hits.len(), 3);
    assert!(hits[0].chunk.text.contains("Knee surgery"));
    for w in hits.windows(2) { assert!(w[0].score >= w[1].score); }
}

#[test]
fn search_returns_fewer_when_index_is_small() {
    let index = VectorIndex::new(3).unwrap();
    index.insert(chunk_at("a", 0), unit(3, 0)).unwrap();
    index.insert(chunk_at("a", 1), unit(3, 1)).unwrap();
    let hits = index.search(&unit(3, 0), 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert_eq!(hits[0].chunk.sequence_index, 0);
}

#[test]
fn search_rejects_bad_arguments() {
    let index = VectorIndex::new(3).unwrap();
    assert!(matches!(index.search(&unit(3, 0), 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(index.search(&[1.0], 1), Err(Error::DimensionMismatch { expected: 3, actual: 1 })));
    assert!(index.search(&unit(3, 0), 1).unwrap().is_empty());
}

#[test]
fn ties_break_by_document_then_sequence() {
    let index = VectorIndex::new(2).unwrap();
    let v = vec![0.6, 0.8];
    index.insert(chunk_at("b", 1), v.clone()).unwrap();
    index.insert(chunk_at("b", 0), v.clone()).unwrap();
    index.insert(chunk_at("a", 2), v.clone()).unwrap();
    index.insert(chunk_at("c", 0), vec![0.0, 1.0]).unwrap();

    let first = index.search(&v, 4).unwrap();
    let order: Vec<(String, usize)> = first.iter().map(|m| (m.chunk.document_id.clone(), m.chunk.sequence_index)).collect();
    assert_eq!(order, vec![("a".into(), 2), ("b".into(), 0), ("b".into(), 1), ("c".into(), 0)]);

    // top_k cut inside a tie keeps the lowest identities.
    let cut = index.search(&v, 2).unwrap();
    assert_eq!(cut[1].chunk.document_id, "b");
    assert_eq!(cut[1].chunk.sequence_index, 0);

    for _ in 0..5 {
        let again = index.search(&v, 4).unwrap();
        let again: Vec<(String, usize)> = again.iter().map(|m| (m.chunk.document_id.clone(), m.chunk.sequence_index)).collect();
        assert_eq!(again, order);
    }
}

#[test]
fn remove_document_cascades_and_absent_is_noop() {
    let index = VectorIndex::new(2).unwrap();
    index.insert_document("a", (0..3).map(|i| (chunk_at("a", i), unit(2, 0))).collect()).unwrap();
    index.insert_document("b", vec![(chunk_at("b", 0), unit(2, 1))]).unwrap();
    assert_eq!(index.remove_document("a"), 3);
    assert_eq!(index.remove_document("a"), 0);
    assert_eq!(index.remove_document("missing"), 0);
    assert!(index.get("a", 0).is_none());
    assert_eq!(index.max_index("a"), None);
    let stats = index.stats();
    assert_eq!(stats.total_chunks, 1);
    assert_eq!(stats.total_documents, 1);
    let hits = index.search(&unit(2, 0), 5).unwrap();
    assert!(hits.iter().all(|m| m.chunk.document_id == "b"));
}

#[test]
fn zero_query_scores_zero() {
    let index = VectorIndex::new(2).unwrap();
    index.insert(chunk_at("a", 0), unit(2, 0)).unwrap();
    let hits = index.search(&[0.0, 0.0], 1).unwrap();
    assert_eq!(hits[0].score, 0.0);
}

#[test]
fn keyword_postings_follow_document_writes() {
    let index = VectorIndex::new(2).unwrap();
    let policy = Chunk { text: "Knee surgery requires a waiting period.".into(), ..chunk_at("policy", 0) };
    let dental = Chunk { text: "Dental cleaning twice per year.".into(), ..chunk_at("dental", 0) };
    index.insert_document("policy", vec![(policy, unit(2, 0))]).unwrap();
    index.insert_document("dental", vec![(dental, unit(2, 1))]).unwrap();

    let hits = index.keyword_search("knee surgery coverage", 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.document_id, "policy");
    assert!((hits[0].score - 2.0 / 3.0).abs() < 1e-6);
    assert!(index.keyword_search("orthodontics", 5).unwrap().is_empty());
    assert!(matches!(index.keyword_search("knee", 0), Err(Error::InvalidArgument(_))));

    let replacement = Chunk { text: "Hip replacement only.".into(), ..chunk_at("policy", 0) };
    index.replace_document("policy", vec![(replacement, unit(2, 0))]).unwrap();
    assert!(index.keyword_search("knee surgery", 5).unwrap().is_empty());
    assert_eq!(index.keyword_search("replacement", 5).unwrap()[0].chunk.document_id, "policy");

    index.remove_document("dental");
    assert!(index.keyword_search("dental", 5).unwrap().is_empty());
    assert_eq!(index.stats().keyword_terms, 2);
}

#[test]
fn huge_finite_vectors_score_like_their_direction() {
    let index = VectorIndex::new(2).unwrap();
    index.insert(chunk_at("a", 0), vec![1e30, 0.0]).unwrap();
    index.insert(chunk_at("b", 0), vec![1.0, 0.0]).unwrap();
    let hits = index.search(&[1e30, 0.0], 2).unwrap();
    assert_eq!(hits.len(), 2);
    for m in &hits {
        assert!((m.score - 1.0).abs() < 1e-6, "{} scored {}", m.chunk.document_id, m.score);
    }
    assert_eq!(hits[0].chunk.document_id, "a");
}

#[test]
fn euclidean_metric_ranks_nearest_first() {
    let index = VectorIndex::with_metric(2, Metric::Euclidean).unwrap();
    index.insert(chunk_at("a", 0), vec![10.0, 10.0]).unwrap();
    index.insert(chunk_at("a", 1), vec![1.0, 1.0]).unwrap();
    let hits = index.search(&[1.0, 1.2], 2).unwrap();
    assert_eq!(hits[0].chunk.sequence_index, 1);
    assert!(hits[0].score > hits[1].score);
    assert_eq!(index.stats().metric, Metric::Euclidean);
}

#[test]
fn readers_never_see_partial_documents() {
    let index = Arc::new(VectorIndex::new(4).unwrap());
    let docs = 40usize;
    let per_doc = 8usize;

    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for d in 0..docs {
                let id = format!("doc-{d:03}");
                let entries = (0..per_doc).map(|i| (chunk_at(&id, i), unit(4, i % 4))).collect();
                index.insert_document(&id, entries).unwrap();
                if d % 3 == 0 {
                    index.remove_document(&id);
                }
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|r| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = index.snapshot();
                    let hits = snapshot.search(&unit(4, r), 50).unwrap();
                    for m in &hits {
                        let doc = &m.chunk.document_id;
                        assert_eq!(snapshot.max_index(doc), Some(per_doc - 1));
                        assert_eq!(snapshot.document_chunks(doc).len(), per_doc);
                    }
                    assert_eq!(snapshot.len(), snapshot.document_count() * per_doc);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers { r.join().unwrap(); }
    assert_eq!(index.document_count(), docs - docs.div_ceil(3));
}
