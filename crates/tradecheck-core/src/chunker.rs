//! Splits rule documents into bounded, ordered chunks.
//!
//! Chunks break on whitespace and never exceed `max_chars` characters. A
//! single word longer than the limit is cut at character boundaries. With
//! `overlap_chars == 0` (the default) concatenating a document's chunks in
//! order reproduces its non-whitespace content exactly.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Chunk, RuleDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    /// Trailing words of a chunk (up to this many characters) repeated at the
    /// start of the next one.
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 1000, overlap_chars: 0 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chars == 0 {
            return Err(Error::InvalidConfig("max_chars must be > 0".into()));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(Error::InvalidConfig(format!(
                "overlap_chars ({}) must be < max_chars ({})",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

/// A range of the source text in both byte and character coordinates. Words
/// and chunk spans share the shape.
#[derive(Debug, Clone, Copy)]
struct Word {
    byte_start: usize,
    byte_end: usize,
    char_start: usize,
    char_end: usize,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    /// Chunks every document in order; chunk order follows document order.
    pub fn chunk_corpus(&self, documents: &[RuleDocument]) -> Vec<Chunk> {
        let mut all_chunks = Vec::new();
        for doc in documents {
            let chunks = self.chunk_document(doc);
            debug!(doc_id = %doc.id, chunks = chunks.len(), "chunked rule document");
            all_chunks.extend(chunks);
        }
        all_chunks
    }

    /// Blank documents produce no chunks.
    pub fn chunk_document(&self, doc: &RuleDocument) -> Vec<Chunk> {
        let spans = self.spans(&doc.text);
        let total_chunks = spans.len();
        spans
            .into_iter()
            .enumerate()
            .map(|(chunk_index, span)| Chunk {
                id: format!("{}:{}", doc.id, chunk_index),
                doc_id: doc.id.clone(),
                content: doc.text[span.byte_start..span.byte_end].to_string(),
                start: span.char_start,
                end: span.char_end,
                byte_start: span.byte_start,
                byte_end: span.byte_end,
                chunk_index,
                total_chunks,
            })
            .collect()
    }

    fn spans(&self, text: &str) -> Vec<Word> {
        let max = self.config.max_chars;
        let overlap = self.config.overlap_chars;
        let words = split_words(text);
        let mut spans = Vec::new();
        let mut i = 0;
        while i < words.len() {
            let first = words[i];
            let mut j = i;
            while j < words.len() && words[j].char_end - first.char_start <= max {
                j += 1;
            }
            if j == i {
                split_oversized(text, first, max, &mut spans);
                i += 1;
                continue;
            }
            let last = words[j - 1];
            spans.push(Word { byte_end: last.byte_end, char_end: last.char_end, ..first });
            if j == words.len() {
                break;
            }
            // Step back over trailing words for overlap, but only while the
            // next chunk can still take in word `j`.
            let mut next = j;
            while overlap > 0
                && next - 1 > i
                && words[j - 1].char_end - words[next - 1].char_start <= overlap
                && words[j].char_end - words[next - 1].char_start <= max
            {
                next -= 1;
            }
            i = next;
        }
        spans
    }
}

fn split_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut char_pos = 0;
    for (byte, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some((byte_start, char_start)) = current.take() {
                words.push(Word { byte_start, byte_end: byte, char_start, char_end: char_pos });
            }
        } else if current.is_none() {
            current = Some((byte, char_pos));
        }
        char_pos += 1;
    }
    if let Some((byte_start, char_start)) = current {
        words.push(Word { byte_start, byte_end: text.len(), char_start, char_end: char_pos });
    }
    words
}

fn split_oversized(text: &str, word: Word, max: usize, spans: &mut Vec<Word>) {
    let slice = &text[word.byte_start..word.byte_end];
    let starts: Vec<(usize, usize)> = slice
        .char_indices()
        .enumerate()
        .step_by(max)
        .map(|(c, (b, _))| (word.byte_start + b, word.char_start + c))
        .collect();
    for (n, &(byte_start, char_start)) in starts.iter().enumerate() {
        let (byte_end, char_end) = starts.get(n + 1).copied().unwrap_or((word.byte_end, word.char_end));
        spans.push(Word { byte_start, byte_end, char_start, char_end });
    }
}
