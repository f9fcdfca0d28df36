//! Overlapping fixed-size chunking.
//!
//! Text is first split into units by a [`Segmenter`], then grouped into
//! windows of `chunk_size` units whose starts are `chunk_size - overlap`
//! units apart. Units are byte spans that tile the input, so every chunk is
//! an exact slice of the source text.

use std::ops::Range;

use tracing::debug;

use crate::config::{ChunkUnit, ChunkingConfig};
use crate::error::{Error, Result};
use crate::types::Chunk;

/// Splits text into units. The returned spans must be non-empty, ascending
/// and must cover `text` without gaps.
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<Range<usize>>;
}

/// One unit per Unicode scalar value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharSegmenter;

impl Segmenter for CharSegmenter {
    fn segment(&self, text: &str) -> Vec<Range<usize>> {
        text.char_indices().map(|(i, c)| i..i + c.len_utf8()).collect()
    }
}

/// One unit per word: a run of non-whitespace plus the whitespace after it.
/// Leading whitespace is attached to the first word.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordSegmenter;

impl Segmenter for WordSegmenter {
    fn segment(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans: Vec<Range<usize>> = Vec::new();
        let mut start = 0usize;
        let mut seen_word = false;
        let mut in_space = false;
        for (i, c) in text.char_indices() {
            let space = c.is_whitespace();
            if !space && in_space && seen_word {
                spans.push(start..i);
                start = i;
            }
            if !space {
                seen_word = true;
            }
            in_space = space;
        }
        if start < text.len() {
            spans.push(start..text.len());
        }
        spans
    }
}

pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    segmenter: Box<dyn Segmenter>,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        let segmenter: Box<dyn Segmenter> = match config.unit {
            ChunkUnit::Chars => Box::new(CharSegmenter),
            ChunkUnit::Words => Box::new(WordSegmenter),
        };
        Self::with_segmenter(config.chunk_size, config.chunk_overlap, segmenter)
    }

    pub fn with_segmenter(chunk_size: usize, overlap: usize, segmenter: Box<dyn Segmenter>) -> Result<Self> {
        ChunkingConfig { chunk_size, chunk_overlap: overlap, unit: ChunkUnit::Chars }.validate()?;
        Ok(Self { chunk_size, overlap, segmenter })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }
    pub fn overlap(&self) -> usize { self.overlap }

    /// Split `text` into ordered chunks with sequence indices `0..n`.
    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let units = self.segmenter.segment(text);
        let mut chunks = Vec::new();
        if units.is_empty() {
            return chunks;
        }
        let stride = self.chunk_size - self.overlap;
        let mut first = 0usize;
        loop {
            let last = (first + self.chunk_size).min(units.len()) - 1;
            let span = units[first].start..units[last].end;
            chunks.push(Chunk {
                document_id: document_id.to_string(),
                sequence_index: chunks.len(),
                text: text[span.clone()].to_string(),
                start: span.start,
                end: span.end,
            });
            if last + 1 >= units.len() {
                break;
            }
            first += stride;
        }
        debug!(document_id, units = units.len(), chunks = chunks.len(), "chunked document");
        chunks
    }
}

/// Character-unit chunking; fails with a configuration error unless
/// `overlap < chunk_size`.
pub fn chunk(document_id: &str, text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if overlap >= chunk_size {
        return Err(Error::Configuration(format!(
            "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(Chunker::with_segmenter(chunk_size, overlap, Box::new(CharSegmenter))?.chunk(document_id, text))
}
