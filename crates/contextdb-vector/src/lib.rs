//! contextdb-vector
//!
//! In-memory vector index with document-atomic writes and consistent read
//! snapshots, plus term postings for keyword matching. See `index` for the
//! locking discipline and `similarity` for the scoring functions.

pub mod index;
pub mod keyword;
pub mod similarity;

pub use index::{IndexEntry, IndexReader, IndexStats, VectorIndex};
pub use similarity::Metric;
