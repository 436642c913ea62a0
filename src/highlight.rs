//! Snippet highlighting
//!
//! Document snippets are treated as data. Highlighting is carried as explicit
//! byte spans over plain text, and markup is only produced at render time with
//! the text escaped. Raw snippet markup is never passed through.

use serde::{Deserialize, Serialize};

const MARK_OPEN: &str = "<mark>";
const MARK_CLOSE: &str = "</mark>";

/// Half-open byte range `[start, end)` into `Snippet::text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub spans: Vec<HighlightSpan>,
}

impl Snippet {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: Vec::new(),
        }
    }

    /// Parse text carrying `<mark>..</mark>` pairs into plain text plus spans.
    /// Only balanced, literal `<mark>` pairs are recognised; every other tag,
    /// including an unclosed `<mark>`, stays in the text and is escaped on render.
    pub fn from_marked(raw: &str) -> Self {
        let mut text = String::with_capacity(raw.len());
        let mut spans = Vec::new();
        let mut rest = raw;

        while let Some(open) = rest.find(MARK_OPEN) {
            let inner = &rest[open + MARK_OPEN.len()..];
            let Some(close) = inner.find(MARK_CLOSE) else {
                break;
            };
            text.push_str(&rest[..open]);
            let start = text.len();
            text.push_str(&inner[..close]);
            if close > 0 {
                spans.push(HighlightSpan {
                    start,
                    end: text.len(),
                });
            }
            rest = &inner[close + MARK_CLOSE.len()..];
        }
        text.push_str(rest);

        Self { text, spans }
    }

    /// Highlight every ASCII-case-insensitive occurrence of the given terms.
    pub fn with_terms(text: impl Into<String>, terms: &[&str]) -> Self {
        let text = text.into();
        // ASCII lowering keeps byte offsets aligned with `text`.
        let haystack = text.to_ascii_lowercase();
        let mut spans = Vec::new();

        for term in terms {
            let needle = term.trim().to_ascii_lowercase();
            if needle.is_empty() {
                continue;
            }
            let mut from = 0;
            while let Some(pos) = haystack[from..].find(&needle) {
                let start = from + pos;
                spans.push(HighlightSpan {
                    start,
                    end: start + needle.len(),
                });
                from = start + needle.len();
            }
        }

        Self {
            spans: merge_spans(spans),
            text,
        }
    }

    /// The highlighted fragments, in order.
    pub fn highlighted(&self) -> Vec<&str> {
        self.spans.iter().map(|s| &self.text[s.start..s.end]).collect()
    }

    /// HTML with the text escaped and highlights wrapped in `<mark>`.
    pub fn to_html(&self) -> String {
        self.render(escape_html, MARK_OPEN, MARK_CLOSE)
    }

    /// Terminal rendering with highlights wrapped in `open`/`close`.
    pub fn to_marked_text(&self, open: &str, close: &str) -> String {
        self.render(|s| s.to_string(), open, close)
    }

    fn render<F>(&self, escape: F, open: &str, close: &str) -> String
    where
        F: Fn(&str) -> String,
    {
        let mut out = String::with_capacity(self.text.len() + self.spans.len() * 13);
        let mut cursor = 0;
        for span in &self.spans {
            out.push_str(&escape(&self.text[cursor..span.start]));
            out.push_str(open);
            out.push_str(&escape(&self.text[span.start..span.end]));
            out.push_str(close);
            cursor = span.end;
        }
        out.push_str(&escape(&self.text[cursor..]));
        out
    }
}

fn merge_spans(mut spans: Vec<HighlightSpan>) -> Vec<HighlightSpan> {
    spans.sort();
    let mut merged: Vec<HighlightSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_marked_extracts_spans() {
        let snippet = Snippet::from_marked("Skilled in <mark>Python</mark>, Java, and React.");
        assert_eq!(snippet.text, "Skilled in Python, Java, and React.");
        assert_eq!(snippet.highlighted(), vec!["Python"]);
    }

    #[test]
    fn test_untrusted_markup_is_escaped() {
        let snippet = Snippet::from_marked("<script>alert(1)</script> and <mark>reviews</mark>");
        let html = snippet.to_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.ends_with("<mark>reviews</mark>"));
    }

    #[test]
    fn test_markup_inside_highlight_is_escaped() {
        let snippet = Snippet::from_marked("<mark><img src=x onerror=y></mark>");
        assert_eq!(snippet.to_html(), "<mark>&lt;img src=x onerror=y&gt;</mark>");
    }

    #[test]
    fn test_unclosed_mark_stays_literal() {
        let snippet = Snippet::from_marked("a <mark>b");
        assert_eq!(snippet.text, "a <mark>b");
        assert!(snippet.spans.is_empty());
        assert_eq!(snippet.to_html(), "a &lt;mark&gt;b");
    }

    #[test]
    fn test_with_terms_case_insensitive_and_merged() {
        let snippet = Snippet::with_terms("Python and python-ish PYTHON", &["python", "thon"]);
        assert_eq!(snippet.highlighted(), vec!["Python", "python", "PYTHON"]);
    }

    #[test]
    fn test_terminal_rendering() {
        let snippet = Snippet::from_marked("needs <mark>documentation</mark> work");
        assert_eq!(snippet.to_marked_text("[", "]"), "needs [documentation] work");
    }
}
