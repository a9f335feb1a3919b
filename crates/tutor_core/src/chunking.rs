//! crates/tutor_core/src/chunking.rs
//!
//! Recursive character splitting. Text is cut on the coarsest separator that
//! occurs in it; pieces that are still too long are split again with the next,
//! finer separator. Small pieces are then merged back into windows of at most
//! `chunk_size` characters, and each new window starts with up to
//! `chunk_overlap` characters carried over from the end of the previous one.
//!
//! Lengths are counted in characters, not bytes.

use crate::domain::{ChunkMetadata, DocumentChunk, RawDocument};
use std::collections::VecDeque;
use tracing::{info, warn};

/// Paragraph, line, CJK full stop, CJK comma, space, then single characters.
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n", "。", "，", " ", ""];

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

impl Chunker {
    pub fn new(mut config: ChunkerConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        config.chunk_overlap = config.chunk_overlap.min(config.chunk_size - 1);
        if config.separators.last().map(|s| !s.is_empty()).unwrap_or(true) {
            config.separators.push(String::new());
        }
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Splits every document into chunks, keeping source metadata.
    pub fn chunk_documents(&self, documents: &[RawDocument]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();
        for document in documents {
            if document.text.trim().is_empty() {
                warn!("Skipping empty document: {}", document.source.display());
                continue;
            }
            let mut cursor = CharCursor::new(&document.text);
            for (chunk_index, (byte_offset, text)) in self.split_with_offsets(&document.text).into_iter().enumerate() {
                chunks.push(DocumentChunk {
                    metadata: ChunkMetadata {
                        source: document.source.clone(),
                        page: document.page,
                        chunk_index,
                        offset: cursor.advance_to(byte_offset),
                    },
                    text,
                });
            }
        }
        info!("Chunking produced {} chunks from {} documents", chunks.len(), documents.len());
        chunks
    }

    /// Splits one text into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with_offsets(text).into_iter().map(|(_, chunk)| chunk).collect()
    }

    /// Like `split_text`, paired with the byte offset of each chunk in `text`.
    pub fn split_with_offsets(&self, text: &str) -> Vec<(usize, String)> {
        let separators: Vec<&str> = self.config.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, 0, &separators)
    }

    fn split_recursive(&self, text: &str, base: usize, separators: &[&str]) -> Vec<(usize, String)> {
        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                break;
            }
            if text.contains(candidate) {
                separator = *candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<Piece> = Vec::new();
        for (at, piece) in split_keeping_separator(text, separator) {
            let start = base + at;
            let len = char_len(piece);
            if len < self.config.chunk_size {
                pending.push(Piece { start, text: piece, len });
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                push_trimmed(&mut chunks, start, piece);
            } else {
                chunks.extend(self.split_recursive(piece, start, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Pieces are contiguous in the source, so a window is one source slice.
    fn merge(&self, pieces: &[Piece]) -> Vec<(usize, String)> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let mut out = Vec::new();
        let mut window: VecDeque<&Piece> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            if total + piece.len > size && !window.is_empty() {
                push_window(&mut out, &window);
                while total > overlap || (total + piece.len > size && total > 0) {
                    match window.pop_front() {
                        Some(dropped) => total -= dropped.len,
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += piece.len;
        }
        push_window(&mut out, &window);
        out
    }
}

/// A slice of the document with its byte offset and length in characters.
struct Piece<'a> {
    start: usize,
    text: &'a str,
    len: usize,
}

fn push_window(out: &mut Vec<(usize, String)>, window: &VecDeque<&Piece>) {
    let Some(first) = window.front() else {
        return;
    };
    let joined: String = window.iter().map(|piece| piece.text).collect();
    push_trimmed(out, first.start, &joined);
}

fn push_trimmed(out: &mut Vec<(usize, String)>, start: usize, text: &str) {
    let leading = text.len() - text.trim_start().len();
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push((start + leading, trimmed.to_string()));
    }
}

/// Splits so that every piece after the first starts with the separator.
/// An empty separator splits into single characters. Each piece comes with
/// its byte offset in `text`.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<(usize, &'a str)> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| (i, &text[i..i + c.len_utf8()]))
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0usize;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push((start, &text[start..idx]));
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push((start, &text[start..]));
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Converts ascending byte offsets into character offsets in one pass.
struct CharCursor<'a> {
    text: &'a str,
    byte: usize,
    chars: usize,
}

impl<'a> CharCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, byte: 0, chars: 0 }
    }

    fn advance_to(&mut self, byte: usize) -> usize {
        if byte < self.byte {
            self.byte = 0;
            self.chars = 0;
        }
        self.chars += char_len(&self.text[self.byte..byte]);
        self.byte = byte;
        self.chars
    }
}
