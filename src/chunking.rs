//! Page-aware document chunking.
//!
//! [`RecursiveChunker`] splits extracted page text into overlapping chunks
//! using a recursive separator strategy: paragraph breaks first, then line
//! breaks, sentence boundaries, whitespace, and finally a hard character
//! cut — guaranteeing termination on input with no natural breakpoints.
//! All sizes are counted in characters, never bytes.

use chrono::Utc;

use crate::config::RagConfig;
use crate::document::{Chunk, Page, chunk_key};

/// Separator hierarchy, coarsest first. The final fallback is a hard
/// character cut applied when none of these produce small enough pieces.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// A strategy for splitting a document's pages into chunks.
///
/// Implementations produce [`Chunk`]s with text and provenance but no
/// embeddings. Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document's extracted pages into ordered chunks.
    ///
    /// Returns an empty `Vec` when the pages contain no text.
    fn split(&self, document: &str, pages: &[Page]) -> Vec<Chunk>;
}

/// Splits concatenated page text into overlapping chunks.
///
/// Page texts are concatenated while a character-offset index of page
/// boundaries is retained, so a chunk carries the page containing its
/// first character (and the last page it spans, if it crosses one).
/// Each chunk except the first starts with the trailing
/// `chunk_overlap` characters of its predecessor, duplicated verbatim;
/// every chunk is at most `chunk_size` characters long.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new chunker. `chunk_overlap` must be strictly less than
    /// `chunk_size`; [`RagConfig`](crate::RagConfig) validation enforces
    /// this before a chunker is built.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Create a chunker from pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, document: &str, pages: &[Page]) -> Vec<Chunk> {
        // Concatenate non-empty pages, remembering where each begins.
        let mut text = String::new();
        let mut boundaries: Vec<(usize, u32)> = Vec::new();
        let mut offset = 0usize;
        for page in pages {
            if page.text.is_empty() {
                continue;
            }
            boundaries.push((offset, page.number));
            offset += char_len(&page.text);
            text.push_str(&page.text);
        }
        if text.is_empty() {
            return Vec::new();
        }

        // Units carry the new (non-duplicated) content of each chunk and
        // are sized so that the overlap prefix still fits under the cap.
        let budget = self.chunk_size - self.chunk_overlap;
        let units = split_units(&text, budget, &SEPARATORS);

        let now = Utc::now();
        let mut chunks = Vec::with_capacity(units.len());
        let mut carry = String::new();
        let mut unit_start = 0usize;
        for (ordinal, unit) in units.into_iter().enumerate() {
            let unit_len = char_len(&unit);
            let page = page_at(&boundaries, unit_start);
            let last = page_at(&boundaries, unit_start + unit_len.saturating_sub(1));
            let chunk_text = format!("{carry}{unit}");
            carry = tail_chars(&chunk_text, self.chunk_overlap);
            chunks.push(Chunk {
                key: chunk_key(document, ordinal),
                document: document.to_string(),
                page,
                page_end: (last != page).then_some(last),
                ordinal,
                text: chunk_text,
                embedding: Vec::new(),
                created_at: now,
            });
            unit_start += unit_len;
        }
        chunks
    }
}

/// Recursively split `text` into pieces of at most `budget` characters,
/// preferring the given separators in order. Separators stay attached to
/// the preceding piece, so concatenating the pieces reproduces `text`
/// exactly.
fn split_units(text: &str, budget: usize, separators: &[&str]) -> Vec<String> {
    if char_len(text) <= budget {
        return vec![text.to_string()];
    }
    let Some((separator, rest)) = separators.split_first() else {
        return hard_cut(text, budget);
    };

    let mut units = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for segment in split_keeping_separator(text, separator) {
        let segment_len = char_len(segment);
        if current_len + segment_len <= budget {
            current.push_str(segment);
            current_len += segment_len;
            continue;
        }
        if !current.is_empty() {
            units.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if segment_len <= budget {
            current.push_str(segment);
            current_len = segment_len;
        } else {
            units.extend(split_units(segment, budget, rest));
        }
    }
    if !current.is_empty() {
        units.push(current);
    }
    units
}

/// Split text at a separator, keeping the separator attached to the
/// preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;
    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        result.push(&text[start..]);
    }
    result
}

/// Last-resort split every `budget` characters, honoring char boundaries.
fn hard_cut(text: &str, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for ch in text.chars() {
        current.push(ch);
        current_len += 1;
        if current_len == budget {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Page number containing the character at `offset`.
fn page_at(boundaries: &[(usize, u32)], offset: usize) -> u32 {
    let idx = boundaries.partition_point(|(start, _)| *start <= offset);
    boundaries[idx.saturating_sub(1)].1
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The trailing `n` characters of `s` (all of `s` if shorter).
fn tail_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    if len <= n { s.to_string() } else { s.chars().skip(len - n).collect() }
}
