//! Document chunking
//!
//! Splits document text into overlapping, bounded-size chunks along natural
//! boundaries (paragraphs or sentences). Chunking is pure and synchronous;
//! its output is cached per document by [`ChunkCache`].

mod cache;
mod splitter;

pub use cache::ChunkCache;

use crate::documents::Document;
use crate::error::{RagError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use splitter::{split_units, trailing_words, Unit};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Approximate characters per word when converting `overlap_size` to words
const CHARS_PER_WORD: usize = 5;

const FORM_FEED: char = '\x0c';

/// Natural unit used to split text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitBy {
    /// Blank-line separated paragraphs
    #[default]
    Paragraph,
    /// Sentences ending in `.`, `!` or `?`
    Sentence,
}

impl SplitBy {
    fn separator(self) -> &'static str {
        match self {
            SplitBy::Paragraph => "\n\n",
            SplitBy::Sentence => " ",
        }
    }
}

impl FromStr for SplitBy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "paragraph" => Ok(SplitBy::Paragraph),
            "sentence" => Ok(SplitBy::Sentence),
            other => Err(RagError::Config(format!(
                "Unknown split mode '{}', expected 'paragraph' or 'sentence'",
                other
            ))),
        }
    }
}

impl fmt::Display for SplitBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitBy::Paragraph => write!(f, "paragraph"),
            SplitBy::Sentence => write!(f, "sentence"),
        }
    }
}

/// Chunk size limits, measured in characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkOptions {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap_size: usize,
    pub split_by: SplitBy,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: 512,
            min_chunk_size: 100,
            overlap_size: 50,
            split_by: SplitBy::Paragraph,
        }
    }
}

impl ChunkOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 || self.min_chunk_size == 0 {
            return Err(RagError::Config(
                "Chunk sizes must be greater than 0".to_string(),
            ));
        }
        if self.min_chunk_size > self.max_chunk_size {
            return Err(RagError::Config(format!(
                "min_chunk_size ({}) exceeds max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        Ok(())
    }

    fn overlap_words(&self) -> usize {
        self.overlap_size / CHARS_PER_WORD
    }
}

/// Metadata carried by every chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// A bounded span of a document used as the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// `{document_id}_chunk_{chunk_index}`
    pub id: String,
    pub text: String,
    /// Byte offset of the first covered character in the document content
    pub start_index: usize,
    /// Byte offset one past the last covered character
    pub end_index: usize,
    pub document_id: String,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
    /// Embedding supplied by the caller, used instead of asking the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn chunk_id(document_id: &str, chunk_index: usize) -> String {
        format!("{}_chunk_{}", document_id, chunk_index)
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Chunk raw text that has no document metadata beyond its filename
pub fn chunk_text(
    text: &str,
    document_id: &str,
    filename: &str,
    options: &ChunkOptions,
) -> Result<Vec<Chunk>> {
    let base = ChunkMetadata {
        filename: filename.to_string(),
        ..ChunkMetadata::default()
    };
    build_chunks(text, document_id, &base, options)
}

/// Chunk a document; every chunk inherits the document's metadata
pub fn chunk_document(document: &Document, options: &ChunkOptions) -> Result<Vec<Chunk>> {
    let base = ChunkMetadata {
        filename: document.filename.clone(),
        page_number: document.metadata.page_number,
        section: document.metadata.section.clone(),
        uploaded_at: document.metadata.uploaded_at,
        extra: document.metadata.extra.clone(),
    };
    build_chunks(&document.content, &document.id, &base, options)
}

/// Running chunk under construction
struct Buffer {
    /// Source spans in document order; the first may be the carried overlap
    spans: Vec<Unit>,
    text: String,
    chars: usize,
}

impl Buffer {
    fn new() -> Self {
        Self {
            spans: Vec::new(),
            text: String::new(),
            chars: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    fn push(&mut self, source: &str, unit: Unit, separator: &str) {
        let piece = unit.as_str(source);
        if !self.text.is_empty() {
            self.text.push_str(separator);
            self.chars += separator.chars().count();
        }
        self.text.push_str(piece);
        self.chars += piece.chars().count();
        self.spans.push(unit);
    }

    /// Seed a fresh buffer with overlap words carried from the previous one
    fn seeded(source: &str, overlap: &[Unit]) -> Self {
        let mut buffer = Self::new();
        if let (Some(first), Some(last)) = (overlap.first(), overlap.last()) {
            let words: Vec<&str> = overlap.iter().map(|w| w.as_str(source)).collect();
            buffer.text = words.join(" ");
            buffer.chars = buffer.text.chars().count();
            buffer.spans.push(Unit {
                start: first.start,
                end: last.end,
            });
        }
        buffer
    }

    fn span(&self) -> Option<(usize, usize)> {
        Some((self.spans.first()?.start, self.spans.last()?.end))
    }
}

fn build_chunks(
    text: &str,
    document_id: &str,
    base: &ChunkMetadata,
    options: &ChunkOptions,
) -> Result<Vec<Chunk>> {
    options.validate()?;

    let separator = options.split_by.separator();
    let separator_chars = separator.chars().count();
    let annotator = Annotator::new(text, base);

    let mut chunks = Vec::new();
    let mut buffer = Buffer::new();

    let emit = |buffer: &Buffer, chunks: &mut Vec<Chunk>| {
        if let Some((start, end)) = buffer.span() {
            let chunk_index = chunks.len();
            chunks.push(Chunk {
                id: Chunk::chunk_id(document_id, chunk_index),
                text: buffer.text.clone(),
                start_index: start,
                end_index: end,
                document_id: document_id.to_string(),
                chunk_index,
                metadata: annotator.metadata_at(start),
                embedding: None,
            });
        }
    };

    for unit in split_units(text, options.split_by) {
        let unit_chars = unit.as_str(text).chars().count();
        let joined = if buffer.is_empty() { 0 } else { separator_chars };

        if !buffer.is_empty()
            && buffer.chars + joined + unit_chars > options.max_chunk_size
            && buffer.chars >= options.min_chunk_size
        {
            emit(&buffer, &mut chunks);

            let overlap = trailing_words(text, &buffer.spans, options.overlap_words());
            buffer = Buffer::seeded(text, &overlap);
            buffer.push(text, unit, " ");
        } else {
            buffer.push(text, unit, separator);
        }
    }

    // A short tail is dropped unless it is the whole document
    if !buffer.is_empty() && (buffer.chars >= options.min_chunk_size || chunks.is_empty()) {
        emit(&buffer, &mut chunks);
    } else if !buffer.is_empty() {
        tracing::debug!(
            "Dropping {} trailing chars of {} below min_chunk_size {}",
            buffer.chars,
            document_id,
            options.min_chunk_size
        );
    }

    tracing::debug!("Chunked {} into {} chunks", document_id, chunks.len());
    Ok(chunks)
}

fn heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,6}[ \t]+(.+?)[ \t#]*$").expect("valid heading regex"))
}

/// Resolves page and section for a chunk from its position in the document
struct Annotator<'a> {
    text: &'a str,
    base: &'a ChunkMetadata,
    paginated: bool,
    headings: Vec<(usize, String)>,
}

impl<'a> Annotator<'a> {
    fn new(text: &'a str, base: &'a ChunkMetadata) -> Self {
        let headings = if base.section.is_none() {
            heading()
                .captures_iter(text)
                .filter_map(|c| {
                    let whole = c.get(0)?;
                    let title = c.get(1)?.as_str().trim();
                    Some((whole.start(), title.to_string()))
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            text,
            base,
            paginated: base.page_number.is_none() && text.contains(FORM_FEED),
            headings,
        }
    }

    fn metadata_at(&self, start: usize) -> ChunkMetadata {
        let mut metadata = self.base.clone();

        if self.paginated {
            let breaks = self.text[..start].matches(FORM_FEED).count();
            metadata.page_number = Some(breaks as u32 + 1);
        }

        if metadata.section.is_none() {
            metadata.section = self
                .headings
                .iter()
                .take_while(|(pos, _)| *pos <= start)
                .last()
                .map(|(_, title)| title.clone());
        }

        metadata
    }
}
