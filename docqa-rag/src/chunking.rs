//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`SentenceChunker`]: splits by paragraphs, then packs whole sentences
//! - [`OverlapChunker`]: slides a fixed window with overlap, snapping ends to sentences
//!
//! All lengths are counted in `char`s so that no chunk boundary falls inside
//! a multi-byte code point.

use crate::document::{Chunk, Document};

/// How far back from a window end [`split_with_overlap`] looks for a sentence terminator.
pub const SENTENCE_SNAP_WINDOW: usize = 100;

/// A strategy for splitting documents into chunks.
///
/// Implementations only decide where text is cut; [`chunk`](Chunker::chunk)
/// turns the pieces into [`Chunk`]s carrying the parent document's metadata.
pub trait Chunker: Send + Sync {
    /// Split raw text into ordered chunk strings.
    fn split(&self, text: &str) -> Vec<String>;

    /// Split a document into chunks.
    ///
    /// Each chunk gets a fresh id and inherits the document metadata plus
    /// `document_id` and `chunk_index`. Empty pieces are skipped.
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .filter(|text| !text.trim().is_empty())
            .enumerate()
            .map(|(i, text)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("document_id".to_string(), document.id.clone());
                metadata.insert("chunk_index".to_string(), i.to_string());
                Chunk::new(text, metadata)
            })
            .collect()
    }
}

/// Boundary-aware chunker: paragraphs first, then whole sentences.
///
/// A sentence longer than `chunk_size` is emitted whole rather than cut
/// mid-word.
///
/// # Example
///
/// ```rust
/// use docqa_rag::{Chunker, SentenceChunker};
///
/// let chunker = SentenceChunker::new(20);
/// let chunks = chunker.split("Alpha causes Beta. Gamma is unrelated.");
/// assert_eq!(chunks, vec!["Alpha causes Beta.", "Gamma is unrelated."]);
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker` emitting chunks of at most `chunk_size` chars.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

impl Chunker for SentenceChunker {
    fn split(&self, text: &str) -> Vec<String> {
        split(text, self.chunk_size)
    }
}

/// Sliding-window chunker where consecutive chunks share about `overlap` chars.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::OverlapChunker;
///
/// let chunker = OverlapChunker::new(800, 200);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct OverlapChunker {
    chunk_size: usize,
    overlap: usize,
}

impl OverlapChunker {
    /// Create a new `OverlapChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: window size in characters
    /// * `overlap`: number of characters shared by consecutive windows
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap }
    }
}

impl Chunker for OverlapChunker {
    fn split(&self, text: &str) -> Vec<String> {
        split_with_overlap(text, self.chunk_size, self.overlap)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split text into chunks of at most `chunk_size` chars along paragraph and
/// sentence boundaries.
///
/// Text that already fits is returned unchanged as the only chunk.
pub fn split(text: &str, chunk_size: usize) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if char_len(paragraph) <= chunk_size {
            chunks.push(paragraph.to_string());
            continue;
        }

        let mut buffer = String::new();
        let mut buffer_len = 0;
        for sentence in split_sentences(paragraph) {
            let sentence_len = char_len(sentence);
            if !buffer.is_empty() && buffer_len + 1 + sentence_len > chunk_size {
                chunks.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }
            if !buffer.is_empty() {
                buffer.push(' ');
                buffer_len += 1;
            }
            buffer.push_str(sentence);
            buffer_len += sentence_len;
        }
        if !buffer.is_empty() {
            chunks.push(buffer);
        }
    }

    chunks.retain(|chunk| !chunk.is_empty());
    chunks
}

/// Split a paragraph after every `.`, `!` or `?` that is followed by whitespace.
///
/// The whitespace between sentences is dropped; each sentence keeps its terminator.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        let followed_by_space = chars.peek().is_some_and(|&(_, next)| next.is_whitespace());
        if !followed_by_space {
            continue;
        }
        sentences.push(&paragraph[start..i + c.len_utf8()]);
        while chars.peek().is_some_and(|&(_, next)| next.is_whitespace()) {
            chars.next();
        }
        start = chars.peek().map_or(paragraph.len(), |&(j, _)| j);
    }

    if start < paragraph.len() {
        sentences.push(&paragraph[start..]);
    }

    sentences.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect()
}

/// Split text with a sliding window of `chunk_size` chars advancing by
/// `chunk_size - overlap`.
///
/// Unless a window reaches the end of the text, its end is pulled back to just
/// after the last sentence terminator within its final
/// [`SENTENCE_SNAP_WINDOW`] chars, when there is one. The end never moves back
/// past the start of the next window, so every char lands in some chunk.
/// Chunks are trimmed.
pub fn split_with_overlap(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total <= chunk_size || chunk_size == 0 || overlap >= chunk_size {
        return vec![text.to_string()];
    }

    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let mut end = (start + chunk_size).min(total);
        if end < total {
            let floor = end.saturating_sub(SENTENCE_SNAP_WINDOW).max(start + step);
            if let Some(pos) = (floor..end).rev().find(|&i| is_terminator(chars[i])) {
                end = pos + 1;
            }
        }

        let piece = text[bounds[start]..bounds[end]].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= total {
            break;
        }
        start += step;
    }

    chunks
}
