//! Display fragments for search results.
//!
//! A fragment is the head of a page's text, optionally cleaned of common OCR
//! noise, with every literal occurrence of the query (and of configured field
//! labels) marked for emphasis. Highlighting works on the original text and the
//! original query; accent folding is only used for matching.

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

pub const ELLIPSIS: &str = "...";
pub const DEFAULT_FRAGMENT_LENGTH: usize = 500;
/// Field labels printed on every catalog page
pub const DEFAULT_LABELS: [&str; 3] = ["Genero", "Cantidad", "Clima"];
const EMPHASIS_MARKER: &str = "**";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentOptions {
    /// Maximum number of characters kept from the page text
    pub length: usize,
    /// Strip OCR separators and collapse whitespace before truncating
    pub clean: bool,
    /// Field labels emphasized wherever they appear (e.g. "Genero")
    pub labels: Vec<String>,
}

impl Default for FragmentOptions {
    fn default() -> Self {
        Self {
            length: DEFAULT_FRAGMENT_LENGTH,
            clean: false,
            labels: default_labels(),
        }
    }
}

pub fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|label| label.to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    None,
    Query,
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentSpan {
    pub text: String,
    pub emphasis: Emphasis,
}

impl FragmentSpan {
    fn new(text: &str, emphasis: Emphasis) -> Self {
        Self {
            text: text.to_string(),
            emphasis,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Fragment {
    spans: Vec<FragmentSpan>,
    truncated: bool,
}

impl Fragment {
    pub fn spans(&self) -> &[FragmentSpan] {
        &self.spans
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Fragment text without emphasis markers or ellipsis.
    pub fn plain(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }

    /// Fragment text with `**` around emphasized spans and a trailing ellipsis
    /// when the page text was cut.
    pub fn marked(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            match span.emphasis {
                Emphasis::None => out.push_str(&span.text),
                Emphasis::Query | Emphasis::Label => {
                    out.push_str(EMPHASIS_MARKER);
                    out.push_str(&span.text);
                    out.push_str(EMPHASIS_MARKER);
                }
            }
        }
        if self.truncated {
            out.push_str(ELLIPSIS);
        }
        out
    }
}

/// Case-insensitive literal matcher for the query and the field labels.
///
/// Both are escaped before compilation, so `$5.00 (special)` only ever matches itself.
#[derive(Debug, Clone, Default)]
pub struct Highlighter {
    query: Option<Regex>,
    labels: Option<Regex>,
}

impl Highlighter {
    pub fn new(query: &str, labels: &[String]) -> Self {
        let query = literal_pattern(std::iter::once(query));

        let mut sorted: Vec<&str> = labels
            .iter()
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .collect();
        // Longest first so "Genero principal" wins over "Genero"
        sorted.sort_by_key(|label| std::cmp::Reverse(label.chars().count()));
        let labels = literal_pattern(sorted.into_iter());

        Self { query, labels }
    }

    /// Split `text` into spans, marking query occurrences and then labels that
    /// do not overlap a query occurrence.
    pub fn apply(&self, text: &str) -> Vec<FragmentSpan> {
        let mut ranges: Vec<(usize, usize, Emphasis)> = Vec::new();

        if let Some(query) = &self.query {
            ranges.extend(
                query
                    .find_iter(text)
                    .filter(|m| !m.is_empty())
                    .map(|m| (m.start(), m.end(), Emphasis::Query)),
            );
        }

        if let Some(labels) = &self.labels {
            let query_ranges: Vec<(usize, usize)> =
                ranges.iter().map(|(start, end, _)| (*start, *end)).collect();
            ranges.extend(
                labels
                    .find_iter(text)
                    .filter(|m| !m.is_empty())
                    .filter(|m| {
                        !query_ranges
                            .iter()
                            .any(|(start, end)| m.start() < *end && *start < m.end())
                    })
                    .map(|m| (m.start(), m.end(), Emphasis::Label)),
            );
        }

        ranges.sort_by_key(|(start, _, _)| *start);

        let mut spans = Vec::with_capacity(ranges.len() * 2 + 1);
        let mut cursor = 0;
        for (start, end, emphasis) in ranges {
            if start > cursor {
                spans.push(FragmentSpan::new(&text[cursor..start], Emphasis::None));
            }
            spans.push(FragmentSpan::new(&text[start..end], emphasis));
            cursor = end;
        }
        if cursor < text.len() {
            spans.push(FragmentSpan::new(&text[cursor..], Emphasis::None));
        }
        spans
    }
}

fn literal_pattern<'a>(alternatives: impl Iterator<Item = &'a str>) -> Option<Regex> {
    let escaped: Vec<String> = alternatives
        .filter(|alt| !alt.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return None;
    }

    let pattern = escaped.join("|");
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(err) => {
            // Only reachable for patterns beyond the regex size limit
            tracing::warn!(error = %err, "highlighting disabled for oversized pattern");
            None
        }
    }
}

/// Remove OCR separators (`|`, `-`, `—`), the `(l` artifact, and line breaks,
/// then collapse whitespace.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '|' | '-' | '—' => out.push(' '),
            '(' if matches!(chars.peek(), Some('l') | Some('L')) => {
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` after `limit` characters, reporting whether anything was dropped.
pub fn truncate_chars(text: &str, limit: usize) -> (&str, bool) {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

pub fn build_fragment(text: &str, options: &FragmentOptions, highlighter: &Highlighter) -> Fragment {
    let source: Cow<'_, str> = if options.clean {
        Cow::Owned(clean_text(text))
    } else {
        Cow::Borrowed(text)
    };

    let (head, truncated) = truncate_chars(&source, options.length);
    Fragment {
        spans: highlighter.apply(head),
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(length: usize, clean: bool) -> FragmentOptions {
        FragmentOptions {
            length,
            clean,
            labels: Vec::new(),
        }
    }

    #[test]
    fn test_truncation_is_exact() {
        let text = "abcdefghij".repeat(60);
        let fragment = build_fragment(&text, &options(500, false), &Highlighter::default());
        assert!(fragment.is_truncated());
        assert_eq!(fragment.plain().chars().count(), 500);
        assert!(fragment.marked().ends_with(ELLIPSIS));
        assert_eq!(fragment.marked().chars().count(), 503);
    }

    #[test]
    fn test_default_options_truncate_exactly() {
        let text = format!("{}{}", "a".repeat(498), "\n".repeat(5));
        let fragment = build_fragment(&text, &FragmentOptions::default(), &Highlighter::default());
        assert!(fragment.is_truncated());
        assert_eq!(fragment.plain().chars().count(), DEFAULT_FRAGMENT_LENGTH);
        assert_eq!(fragment.plain(), format!("{}\n\n", "a".repeat(498)));
        assert!(fragment.marked().ends_with(ELLIPSIS));
    }

    #[test]
    fn test_default_options_emphasize_labels() {
        let options = FragmentOptions::default();
        let highlighter = Highlighter::new("floral", &options.labels);
        let fragment = build_fragment(
            "Genero: Floral\nCANTIDAD: 100ml\nclima: templado",
            &options,
            &highlighter,
        );
        assert_eq!(
            fragment.marked(),
            "**Genero**: **Floral**\n**CANTIDAD**: 100ml\n**clima**: templado"
        );
    }

    #[test]
    fn test_short_text_is_kept_whole() {
        let fragment = build_fragment("short", &options(10, true), &Highlighter::default());
        assert!(!fragment.is_truncated());
        assert_eq!(fragment.marked(), "short");
    }

    #[test]
    fn test_exact_length_is_not_truncated() {
        let fragment = build_fragment("12345", &options(5, false), &Highlighter::default());
        assert!(!fragment.is_truncated());
        assert_eq!(fragment.plain(), "12345");
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let (head, cut) = truncate_chars("ñandú élan", 5);
        assert_eq!(head, "ñandú");
        assert!(cut);
    }

    #[test]
    fn test_highlight_is_case_insensitive() {
        let highlighter = Highlighter::new("rose", &[]);
        let fragment = build_fragment("Rose, rose and ROSEWOOD", &options(100, true), &highlighter);
        assert_eq!(fragment.marked(), "**Rose**, **rose** and **ROSE**WOOD");
    }

    #[test]
    fn test_highlight_escapes_metacharacters() {
        let highlighter = Highlighter::new("$5.00 (special)", &[]);
        let fragment = build_fragment(
            "Price: $5.00 (special) or $5x00 (special)",
            &options(100, false),
            &highlighter,
        );
        assert_eq!(
            fragment.marked(),
            "Price: **$5.00 (special)** or $5x00 (special)"
        );

        // A pattern that would be invalid as a regex
        let highlighter = Highlighter::new("[(*", &[]);
        let fragment = build_fragment("a [(* b", &options(100, false), &highlighter);
        assert_eq!(fragment.marked(), "a **[(*** b");
    }

    #[test]
    fn test_highlight_does_not_fold_accents() {
        let highlighter = Highlighter::new("café", &[]);
        let fragment = build_fragment("Cafe and CAFÉ", &options(100, false), &highlighter);
        assert_eq!(fragment.marked(), "Cafe and **CAFÉ**");
    }

    #[test]
    fn test_highlight_stays_inside_truncated_text() {
        let highlighter = Highlighter::new(".", &[]);
        let fragment = build_fragment("a.b.c.d", &options(3, false), &highlighter);
        assert_eq!(fragment.marked(), "a**.**b...");
    }

    #[test]
    fn test_labels_are_emphasized() {
        let labels = vec!["Genero".to_string(), "Clima".to_string()];
        let highlighter = Highlighter::new("citrico", &labels);
        let fragment = build_fragment(
            "GENERO: citrico | Clima: calido",
            &options(100, true),
            &highlighter,
        );
        assert_eq!(fragment.marked(), "**GENERO**: **citrico** **Clima**: calido");
        let kinds: Vec<Emphasis> = fragment
            .spans()
            .iter()
            .filter(|s| s.emphasis != Emphasis::None)
            .map(|s| s.emphasis)
            .collect();
        assert_eq!(kinds, vec![Emphasis::Label, Emphasis::Query, Emphasis::Label]);
    }

    #[test]
    fn test_query_wins_over_overlapping_label() {
        let labels = vec!["Cantidad".to_string()];
        let highlighter = Highlighter::new("tidad", &labels);
        let fragment = build_fragment("Cantidad: 100ml", &options(100, true), &highlighter);
        assert_eq!(fragment.marked(), "Can**tidad**: 100ml");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Genero | Floral —— Dulce"), "Genero Floral Dulce");
        assert_eq!(clean_text("line one\nline  two\n\n"), "line one line two");
        assert_eq!(clean_text("(lAroma (Lfresco"), "Aroma fresco");
        assert_eq!(clean_text("(x) stays"), "(x) stays");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_clean_happens_before_truncation() {
        let fragment = build_fragment("a  -  b  -  c", &options(3, true), &Highlighter::default());
        assert_eq!(fragment.plain(), "a b");
        assert!(fragment.is_truncated());
    }

    #[test]
    fn test_empty_query_marks_nothing() {
        let highlighter = Highlighter::new("", &[]);
        let fragment = build_fragment("anything", &options(100, false), &highlighter);
        assert_eq!(fragment.spans().len(), 1);
        assert_eq!(fragment.marked(), "anything");
    }
}
