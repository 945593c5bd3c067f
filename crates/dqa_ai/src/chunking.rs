use std::collections::VecDeque;
use std::ops::Range;

use dqa_core::domain::{Document, SourceMetadata};
use dqa_core::error::AppError;
use dqa_core::normalize::normalize_documents;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

// Tried in order; a piece still over the limit after the last one is hard-cut.
const SEPARATORS: [&str; 4] = ["\n\n", "\r\n\r\n", "\n", " "];

/// A bounded span of one normalized record, ready to embed.
///
/// `start..end` are byte offsets into the record's normalized text, and `text` is exactly
/// `normalized[start..end]`. Line endings are not rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_ordinal: u32,
    pub ordinal: u32,
    pub text: String,
    pub text_sha256: String,
    pub start: usize,
    pub end: usize,
    pub metadata: SourceMetadata,
}

impl Chunk {
    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// `chunk_size` is measured in characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, AppError> {
        if chunk_size == 0 {
            return Err(AppError::new("CONFIG_INVALID", "Chunk size must be positive"));
        }
        if chunk_overlap >= chunk_size {
            return Err(
                AppError::new("CONFIG_INVALID", "Chunk overlap must be smaller than chunk size")
                    .with_details(format!("chunk_size={chunk_size}; chunk_overlap={chunk_overlap}")),
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn chunk_documents(&self, docs: &[Document]) -> Vec<Chunk> {
        self.chunk_normalized(docs, &normalize_documents(docs))
    }

    /// `normalized[i]` must be the normalized text of `docs[i]`; chunk spans index into it.
    pub fn chunk_normalized(&self, docs: &[Document], normalized: &[String]) -> Vec<Chunk> {
        let mut out = Vec::new();
        for (doc_idx, (doc, text)) in docs.iter().zip(normalized).enumerate() {
            for (ordinal, span) in self.split_spans(text).into_iter().enumerate() {
                out.push(make_chunk(
                    doc,
                    doc_idx as u32,
                    ordinal as u32,
                    &text[span.clone()],
                    span,
                ));
            }
        }
        out
    }

    /// Byte ranges of the chunks of `text`, in order. Every range is trimmed, non-empty, and at
    /// most `chunk_size` characters long.
    pub fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut raw = Vec::new();
        self.split_range(text, 0..text.len(), 0, &mut raw);
        raw.into_iter()
            .filter_map(|r| trim_range(text, r))
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_spans(text)
            .into_iter()
            .map(|r| text[r].to_string())
            .collect()
    }

    fn split_range(&self, text: &str, range: Range<usize>, sep_idx: usize, out: &mut Vec<Range<usize>>) {
        if char_len(&text[range.clone()]) <= self.chunk_size {
            out.push(range);
            return;
        }

        let slice = &text[range.clone()];
        let Some(idx) = (sep_idx..SEPARATORS.len()).find(|&i| slice.contains(SEPARATORS[i])) else {
            self.hard_cut(text, range, out);
            return;
        };

        let pieces = split_keep_separator(text, range, SEPARATORS[idx]);
        self.merge(text, pieces, idx + 1, out);
    }

    fn merge(&self, text: &str, pieces: Vec<Range<usize>>, next_sep: usize, out: &mut Vec<Range<usize>>) {
        let mut window: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut window_chars = 0usize;

        for piece in pieces {
            let piece_chars = char_len(&text[piece.clone()]);

            if piece_chars > self.chunk_size {
                if let Some(span) = window_span(&window) {
                    out.push(span);
                }
                window.clear();
                window_chars = 0;
                self.split_range(text, piece, next_sep, out);
                continue;
            }

            if !window.is_empty() && window_chars + piece_chars > self.chunk_size {
                if let Some(span) = window_span(&window) {
                    out.push(span);
                }
                while window_chars > self.chunk_overlap
                    || (window_chars > 0 && window_chars + piece_chars > self.chunk_size)
                {
                    match window.pop_front() {
                        Some((_, n)) => window_chars -= n,
                        None => break,
                    }
                }
            }

            window.push_back((piece, piece_chars));
            window_chars += piece_chars;
        }

        if let Some(span) = window_span(&window) {
            out.push(span);
        }
    }

    fn hard_cut(&self, text: &str, range: Range<usize>, out: &mut Vec<Range<usize>>) {
        let mut start = range.start;
        let mut count = 0usize;
        for (offset, _) in text[range.clone()].char_indices() {
            if count == self.chunk_size {
                let cut = range.start + offset;
                out.push(start..cut);
                start = cut;
                count = 0;
            }
            count += 1;
        }
        if start < range.end {
            out.push(start..range.end);
        }
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: 0,
        }
    }
}

fn make_chunk(doc: &Document, document_ordinal: u32, ordinal: u32, text: &str, span: Range<usize>) -> Chunk {
    let text_sha256 = sha256_hex(text.as_bytes());
    let id_input = format!(
        "v1|{}|{}|{}|{}",
        doc.source(),
        document_ordinal,
        ordinal,
        text_sha256
    );
    Chunk {
        chunk_id: sha256_hex(id_input.as_bytes()),
        document_ordinal,
        ordinal,
        text: text.to_string(),
        text_sha256,
        start: span.start,
        end: span.end,
        metadata: doc.metadata.clone(),
    }
}

/// Contiguous pieces covering `range`; each separator stays attached to the piece before it.
fn split_keep_separator(text: &str, range: Range<usize>, sep: &str) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut start = range.start;
    for (offset, _) in text[range.clone()].match_indices(sep) {
        let end = range.start + offset + sep.len();
        if end > start {
            pieces.push(start..end);
            start = end;
        }
    }
    if start < range.end {
        pieces.push(start..range.end);
    }
    pieces
}

fn window_span(window: &VecDeque<(Range<usize>, usize)>) -> Option<Range<usize>> {
    let first = window.front()?;
    let last = window.back()?;
    Some(first.0.start..last.0.end)
}

fn trim_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let s = &text[range.clone()];
    let lead = s.len() - s.trim_start().len();
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = range.start + lead;
    Some(start..start + trimmed.len())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
