//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text hierarchically (paragraphs, lines, sentences, words) and only
//! falls back to hard cuts when a single word is longer than the chunk size.
//!
//! Separators stay attached to the segment that precedes them, so no
//! character of the input is ever dropped. Sizes are counted in characters,
//! never in bytes.

use crate::config::RagConfig;
use crate::document::{Chunk, ChunkLocation, LineRange};

/// Separators tried in order, from the largest semantic unit to the smallest.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting text into chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into ordered, non-empty chunks.
    ///
    /// Returns an empty `Vec` if `text` is empty.
    fn chunk(&self, text: &str) -> Vec<Chunk>;
}

/// Splits text hierarchically: paragraphs → lines → sentences → words → characters.
///
/// Every chunk holds at most `chunk_size` characters. When `chunk_overlap` is
/// non-zero, each chunk after the first is extended backwards by up to that
/// many characters (snapped to a whitespace boundary, never past the previous
/// chunk's start, never beyond `chunk_size`). With zero overlap the chunks
/// concatenate back to the input exactly.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(1000, 200);
/// let chunks = chunker.chunk(&document.text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk (at least 1)
    /// * `chunk_overlap`: maximum number of characters shared with the previous chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// The maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut spans = Vec::new();
        split_spans(text, 0, text.len(), self.chunk_size, &SEPARATORS, &mut spans);
        let spans = apply_overlap(text, &spans, self.chunk_size, self.chunk_overlap);

        let mut starts = TextCursor::default();
        let mut ends = TextCursor::default();

        spans
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                let content = &text[start..end];
                let (start_char, start_line) = starts.advance(text, start);
                let (end_char, end_line) = ends.advance(text, end);
                let to = if content.ends_with('\n') { end_line - 1 } else { end_line };

                Chunk {
                    content: content.to_string(),
                    index,
                    location: ChunkLocation {
                        start: start_char,
                        end: end_char,
                        lines: LineRange { from: start_line, to: to.max(start_line) },
                    },
                }
            })
            .collect()
    }
}

/// Recursively split `text[start..end]` into byte spans of at most
/// `chunk_size` characters, pushing them to `out` in order.
fn split_spans(
    text: &str,
    start: usize,
    end: usize,
    chunk_size: usize,
    separators: &[&str],
    out: &mut Vec<(usize, usize)>,
) {
    if start >= end {
        return;
    }
    if char_len(&text[start..end]) <= chunk_size {
        out.push((start, end));
        return;
    }

    let Some((separator, remaining)) = separators.split_first() else {
        hard_cut(text, start, end, chunk_size, out);
        return;
    };

    let segments = split_keeping_separator(text, start, end, separator);
    if segments.len() < 2 {
        split_spans(text, start, end, chunk_size, remaining, out);
        return;
    }

    // Greedily merge adjacent segments while they fit.
    let mut current: Option<(usize, usize, usize)> = None;
    for (seg_start, seg_end) in segments {
        let seg_len = char_len(&text[seg_start..seg_end]);
        current = match current {
            Some((cur_start, _, cur_len)) if cur_len + seg_len <= chunk_size => {
                Some((cur_start, seg_end, cur_len + seg_len))
            }
            Some((cur_start, cur_end, cur_len)) => {
                flush(text, cur_start, cur_end, cur_len, chunk_size, remaining, out);
                Some((seg_start, seg_end, seg_len))
            }
            None => Some((seg_start, seg_end, seg_len)),
        };
    }
    if let Some((cur_start, cur_end, cur_len)) = current {
        flush(text, cur_start, cur_end, cur_len, chunk_size, remaining, out);
    }
}

fn flush(
    text: &str,
    start: usize,
    end: usize,
    len: usize,
    chunk_size: usize,
    separators: &[&str],
    out: &mut Vec<(usize, usize)>,
) {
    if len > chunk_size {
        split_spans(text, start, end, chunk_size, separators, out);
    } else {
        out.push((start, end));
    }
}

/// Split `text[start..end]` at `separator`, keeping the separator attached to
/// the preceding segment. Returns contiguous byte spans.
fn split_keeping_separator(
    text: &str,
    start: usize,
    end: usize,
    separator: &str,
) -> Vec<(usize, usize)> {
    let mut result = Vec::new();
    let mut cursor = start;

    while let Some(pos) = text[cursor..end].find(separator) {
        let seg_end = cursor + pos + separator.len();
        result.push((cursor, seg_end));
        cursor = seg_end;
    }

    if cursor < end {
        result.push((cursor, end));
    }

    result
}

/// Cut `text[start..end]` every `chunk_size` characters.
fn hard_cut(text: &str, start: usize, end: usize, chunk_size: usize, out: &mut Vec<(usize, usize)>) {
    let mut piece_start = start;
    let mut count = 0;
    for (offset, _) in text[start..end].char_indices() {
        if count == chunk_size {
            out.push((piece_start, start + offset));
            piece_start = start + offset;
            count = 0;
        }
        count += 1;
    }
    if piece_start < end {
        out.push((piece_start, end));
    }
}

/// Extend each span after the first backwards to share context with its
/// predecessor.
fn apply_overlap(
    text: &str,
    spans: &[(usize, usize)],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<(usize, usize)> {
    if chunk_overlap == 0 {
        return spans.to_vec();
    }

    let mut result = Vec::with_capacity(spans.len());
    let mut previous_start = 0;
    for &(start, end) in spans {
        let len = char_len(&text[start..end]);
        let budget = chunk_overlap.min(chunk_size.saturating_sub(len));
        let extended = if budget == 0 || start == 0 {
            start
        } else {
            let candidate = text[previous_start..start]
                .char_indices()
                .rev()
                .take(budget)
                .last()
                .map_or(start, |(offset, _)| previous_start + offset);
            snap_to_word_start(text, candidate, start)
        };
        result.push((extended, end));
        previous_start = start;
    }
    result
}

/// Move `candidate` forward to the start of a word, giving up at `limit`.
fn snap_to_word_start(text: &str, candidate: usize, limit: usize) -> usize {
    let at_boundary =
        candidate == 0 || text[..candidate].chars().next_back().is_some_and(char::is_whitespace);
    if at_boundary {
        return candidate;
    }
    text[candidate..limit]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map_or(limit, |(offset, c)| candidate + offset + c.len_utf8())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Converts monotonically increasing byte offsets into character offsets and
/// 1-based line numbers without rescanning the text.
#[derive(Debug)]
struct TextCursor {
    byte: usize,
    chars: usize,
    line: usize,
}

impl Default for TextCursor {
    fn default() -> Self {
        Self { byte: 0, chars: 0, line: 1 }
    }
}

impl TextCursor {
    fn advance(&mut self, text: &str, byte: usize) -> (usize, usize) {
        if byte > self.byte {
            let skipped = &text[self.byte..byte];
            self.chars += char_len(skipped);
            self.line += skipped.matches('\n').count();
            self.byte = byte;
        }
        (self.chars, self.line)
    }
}
