//! Citation assembly
//!
//! Turns the final ranked results into attributed references, plus the
//! numbered context block handed to a downstream generator.

use crate::error::{RagError, Result};
use crate::retrieval::SearchResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters of chunk text kept in a citation excerpt
pub const DEFAULT_EXCERPT_CHARS: usize = 200;

const ELLIPSIS: &str = "...";

/// Citation style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationFormat {
    #[default]
    Simple,
    Apa,
    Mla,
    Chicago,
}

impl FromStr for CitationFormat {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(CitationFormat::Simple),
            "apa" => Ok(CitationFormat::Apa),
            "mla" => Ok(CitationFormat::Mla),
            "chicago" => Ok(CitationFormat::Chicago),
            other => Err(RagError::Config(format!(
                "Unknown citation format '{}', expected simple, apa, mla or chicago",
                other
            ))),
        }
    }
}

impl fmt::Display for CitationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CitationFormat::Simple => "simple",
            CitationFormat::Apa => "apa",
            CitationFormat::Mla => "mla",
            CitationFormat::Chicago => "chicago",
        };
        f.write_str(name)
    }
}

/// Attributed reference to one ranked chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// 1-based position in the ranked results
    pub index: usize,
    pub chunk_id: String,
    pub document_id: String,
    pub filename: String,
    /// Truncated excerpt of the chunk text
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Final score of the originating result
    pub confidence: f32,
    /// Style-formatted reference string
    pub format: String,
}

fn format_reference(
    format: CitationFormat,
    index: usize,
    filename: &str,
    page: Option<u32>,
    section: Option<&str>,
) -> String {
    // Page 0 is never a real page
    let page = page.filter(|p| *p > 0);

    match format {
        CitationFormat::Simple => {
            let mut out = format!("[{}] {}", index, filename);
            if let Some(page) = page {
                out.push_str(&format!(", p. {}", page));
            }
            if let Some(section) = section.filter(|s| !s.is_empty()) {
                out.push_str(", ");
                out.push_str(section);
            }
            out
        }
        CitationFormat::Apa => match page {
            Some(page) => format!("{} (p. {})", filename, page),
            None => filename.to_string(),
        },
        CitationFormat::Mla => match page {
            Some(page) => format!("\"{}\" {}", filename, page),
            None => format!("\"{}\"", filename),
        },
        CitationFormat::Chicago => match page {
            Some(page) => format!("{}, {}", filename, page),
            None => filename.to_string(),
        },
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(ELLIPSIS);
    out
}

/// One citation per result, numbered in input order
pub fn generate_citations(results: &[SearchResult], format: CitationFormat) -> Vec<Citation> {
    generate_citations_with_excerpt(results, format, DEFAULT_EXCERPT_CHARS)
}

pub fn generate_citations_with_excerpt(
    results: &[SearchResult],
    format: CitationFormat,
    excerpt_chars: usize,
) -> Vec<Citation> {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let index = i + 1;
            let chunk = &result.chunk;
            let metadata = &chunk.metadata;

            Citation {
                index,
                chunk_id: chunk.id.clone(),
                document_id: chunk.document_id.clone(),
                filename: metadata.filename.clone(),
                text: excerpt(&chunk.text, excerpt_chars),
                page_number: metadata.page_number,
                section: metadata.section.clone(),
                confidence: result.score,
                format: format_reference(
                    format,
                    index,
                    &metadata.filename,
                    metadata.page_number,
                    metadata.section.as_deref(),
                ),
            }
        })
        .collect()
}

/// `"[1] text\n\n[2] text"` over the ranked results
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("[{}] {}", i + 1, result.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt embedding the retrieved context ahead of the user's question
pub fn augmented_prompt(query: &str, context: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nAnswer based on the context above:",
        context, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{Chunk, ChunkMetadata};

    fn result(filename: &str, page: Option<u32>, section: Option<&str>, text: &str) -> SearchResult {
        let chunk = Chunk {
            id: format!("{}_chunk_0", filename),
            text: text.to_string(),
            start_index: 0,
            end_index: text.len(),
            document_id: filename.to_string(),
            chunk_index: 0,
            metadata: ChunkMetadata {
                filename: filename.to_string(),
                page_number: page,
                section: section.map(str::to_string),
                ..ChunkMetadata::default()
            },
            embedding: None,
        };
        SearchResult::new(chunk, 0.5, 1.0, 0.8)
    }

    #[test]
    fn test_simple_format() {
        let citations = generate_citations(
            &[result("manual.pdf", Some(5), None, "Install the unit.")],
            CitationFormat::Simple,
        );

        assert_eq!(citations[0].format, "[1] manual.pdf, p. 5");
        assert_eq!(citations[0].index, 1);
        assert_eq!(citations[0].confidence, 0.8);
        assert_eq!(citations[0].text, "Install the unit....");
    }

    #[test]
    fn test_simple_format_with_section_and_without_page() {
        let results = [
            result("a.md", None, Some("Setup"), "x"),
            result("b.md", Some(2), Some("Usage"), "y"),
        ];
        let citations = generate_citations(&results, CitationFormat::Simple);

        assert_eq!(citations[0].format, "[1] a.md, Setup");
        assert_eq!(citations[1].format, "[2] b.md, p. 2, Usage");
    }

    #[test]
    fn test_other_styles() {
        let paged = [result("manual.pdf", Some(5), None, "x")];
        let unpaged = [result("notes.txt", None, None, "x")];

        assert_eq!(generate_citations(&paged, CitationFormat::Apa)[0].format, "manual.pdf (p. 5)");
        assert_eq!(generate_citations(&paged, CitationFormat::Mla)[0].format, "\"manual.pdf\" 5");
        assert_eq!(generate_citations(&paged, CitationFormat::Chicago)[0].format, "manual.pdf, 5");

        assert_eq!(generate_citations(&unpaged, CitationFormat::Apa)[0].format, "notes.txt");
        assert_eq!(generate_citations(&unpaged, CitationFormat::Mla)[0].format, "\"notes.txt\"");
        assert_eq!(generate_citations(&unpaged, CitationFormat::Chicago)[0].format, "notes.txt");
    }

    #[test]
    fn test_ordinals_follow_input_order() {
        let results: Vec<SearchResult> = (0..4)
            .map(|i| result(&format!("f{}.txt", i), None, None, "t"))
            .collect();
        let citations = generate_citations(&results, CitationFormat::Simple);

        let ordinals: Vec<usize> = citations.iter().map(|c| c.index).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);
        assert_eq!(citations[2].filename, "f2.txt");
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let text = "é".repeat(300);
        let citations = generate_citations(&[result("x.txt", None, None, &text)], CitationFormat::Simple);
        assert_eq!(citations[0].text.chars().count(), DEFAULT_EXCERPT_CHARS + ELLIPSIS.len());

        let short = generate_citations_with_excerpt(
            &[result("x.txt", None, None, "abcdef")],
            CitationFormat::Simple,
            3,
        );
        assert_eq!(short[0].text, "abc...");
    }

    #[test]
    fn test_context_and_prompt() {
        let results = [
            result("a.txt", None, None, "first"),
            result("b.txt", None, None, "second"),
        ];
        let context = build_context(&results);
        assert_eq!(context, "[1] first\n\n[2] second");
        assert_eq!(build_context(&[]), "");

        let prompt = augmented_prompt("why?", &context);
        assert_eq!(
            prompt,
            "Context:\n[1] first\n\n[2] second\n\nQuestion: why?\n\nAnswer based on the context above:"
        );
    }

    #[test]
    fn test_format_names() {
        assert_eq!("APA".parse::<CitationFormat>().unwrap(), CitationFormat::Apa);
        assert!("harvard".parse::<CitationFormat>().is_err());
        assert_eq!(CitationFormat::Chicago.to_string(), "chicago");
    }
}
