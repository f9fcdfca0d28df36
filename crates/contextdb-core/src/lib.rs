//! contextdb-core
//!
//! Domain types, error taxonomy, collaborator traits, configuration and the
//! chunker shared by the index and retrieval crates.

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Chunk, ChunkKey, Match, ResultItem};
