//! Splitting raw text into natural units (paragraphs or sentences)
//!
//! Units are byte spans into the original text with surrounding whitespace
//! trimmed, so chunk offsets always point back into the document content.

use super::SplitBy;
use regex::Regex;
use std::sync::OnceLock;

/// A trimmed, non-empty span `[start, end)` of the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unit {
    pub start: usize,
    pub end: usize,
}

impl Unit {
    pub fn as_str<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t\r]*\n").expect("valid paragraph regex"))
}

fn sentence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?]+[.!?]+").expect("valid sentence regex"))
}

fn word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\S+").expect("valid word regex"))
}

/// Trim `text[start..end]` and return it as a unit, or `None` if only whitespace remains
fn trimmed(text: &str, start: usize, end: usize) -> Option<Unit> {
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead == slice.len() {
        return None;
    }
    Some(Unit {
        start: start + lead,
        end: end - trail,
    })
}

/// Split `text` into units in document order
pub(crate) fn split_units(text: &str, split_by: SplitBy) -> Vec<Unit> {
    match split_by {
        SplitBy::Paragraph => split_paragraphs(text),
        SplitBy::Sentence => split_sentences(text),
    }
}

fn split_paragraphs(text: &str) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut last = 0;

    for m in paragraph_break().find_iter(text) {
        units.extend(trimmed(text, last, m.start()));
        last = m.end();
    }
    units.extend(trimmed(text, last, text.len()));

    units
}

fn split_sentences(text: &str) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut last = 0;

    for m in sentence().find_iter(text) {
        units.extend(trimmed(text, m.start(), m.end()));
        last = m.end();
    }
    // Trailing text without terminal punctuation is still content
    units.extend(trimmed(text, last, text.len()));

    units
}

/// Byte spans of the last `count` whitespace-separated words across `spans`
pub(crate) fn trailing_words(text: &str, spans: &[Unit], count: usize) -> Vec<Unit> {
    if count == 0 {
        return Vec::new();
    }

    let mut words: Vec<Unit> = Vec::new();
    for span in spans.iter().rev() {
        let found: Vec<Unit> = word()
            .find_iter(span.as_str(text))
            .map(|m| Unit {
                start: span.start + m.start(),
                end: span.start + m.end(),
            })
            .collect();

        for w in found.into_iter().rev() {
            words.push(w);
            if words.len() == count {
                words.reverse();
                return words;
            }
        }
    }

    words.reverse();
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_units_keep_offsets() {
        let text = "  First para.\n\nSecond para.\r\n\r\n\n Third ";
        let units = split_units(text, SplitBy::Paragraph);

        let parts: Vec<&str> = units.iter().map(|u| u.as_str(text)).collect();
        assert_eq!(parts, vec!["First para.", "Second para.", "Third"]);
    }

    #[test]
    fn test_single_newline_does_not_split() {
        let text = "line one\nline two";
        let units = split_units(text, SplitBy::Paragraph);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].as_str(text), text);
    }

    #[test]
    fn test_sentence_units_include_trailing_fragment() {
        let text = "Hello there. How are you?! Fine";
        let units = split_units(text, SplitBy::Sentence);

        let parts: Vec<&str> = units.iter().map(|u| u.as_str(text)).collect();
        assert_eq!(parts, vec!["Hello there.", "How are you?!", "Fine"]);
    }

    #[test]
    fn test_whitespace_only_text_has_no_units() {
        assert!(split_units(" \n\n \t", SplitBy::Paragraph).is_empty());
        assert!(split_units("   ", SplitBy::Sentence).is_empty());
    }

    #[test]
    fn test_trailing_words_across_spans() {
        let text = "alpha beta\n\ngamma delta epsilon";
        let spans = split_units(text, SplitBy::Paragraph);

        let words = trailing_words(text, &spans, 4);
        let parts: Vec<&str> = words.iter().map(|w| w.as_str(text)).collect();
        assert_eq!(parts, vec!["beta", "gamma", "delta", "epsilon"]);

        assert!(trailing_words(text, &spans, 0).is_empty());
        assert_eq!(trailing_words(text, &spans, 50).len(), 5);
    }
}
