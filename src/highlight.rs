//! HTML syntax highlighting for Ninox code
//!
//! Each token kind maps to a CSS class (`nx-*`). Token text is HTML-escaped; an
//! optional query is located case-insensitively and wrapped in a highlight span.

use crate::token::{Token, TokenKind, tokenize};

/// CSS class wrapped around a search match
pub const HIGHLIGHT_CLASS: &str = "nx-highlight";

impl TokenKind {
    /// CSS class for this token kind, `None` for whitespace and newlines.
    pub fn css_class(&self) -> Option<&'static str> {
        match self {
            TokenKind::Keyword => Some("nx-keyword"),
            TokenKind::Operator => Some("nx-operator"),
            TokenKind::String => Some("nx-string"),
            TokenKind::Number => Some("nx-number"),
            TokenKind::Comment => Some("nx-comment"),
            TokenKind::Builtin => Some("nx-builtin"),
            TokenKind::Field => Some("nx-field"),
            TokenKind::Table => Some("nx-table"),
            TokenKind::Punctuation => Some("nx-punctuation"),
            TokenKind::Identifier => Some("nx-identifier"),
            TokenKind::Whitespace | TokenKind::Newline => None,
        }
    }
}

/// Escape `& < > "` for HTML output.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Byte range of the first case-insensitive occurrence of `needle` in `haystack`.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    haystack.char_indices().find_map(|(start, _)| {
        let mut rest = haystack[start..].char_indices();
        let mut wanted = needle.chars();
        loop {
            let Some(n) = wanted.next() else {
                let end = rest.next().map_or(haystack.len(), |(i, _)| start + i);
                return Some((start, end));
            };
            let (_, h) = rest.next()?;
            if !h.to_lowercase().eq(n.to_lowercase()) {
                return None;
            }
        }
    })
}

/// Escaped token text, with the first match of `query` wrapped in a highlight span.
fn escape_with_match(text: &str, query: Option<&str>) -> String {
    match query.and_then(|q| find_ignore_case(text, q)) {
        Some((start, end)) => format!(
            "{}<span class=\"{HIGHLIGHT_CLASS}\">{}</span>{}",
            escape_html(&text[..start]),
            escape_html(&text[start..end]),
            escape_html(&text[end..]),
        ),
        None => escape_html(text),
    }
}

/// Render one token as HTML.
pub fn highlight_token(token: &Token<'_>, query: Option<&str>) -> String {
    let body = escape_with_match(token.text, query);
    match token.kind.css_class() {
        Some(class) => format!("<span class=\"{class}\">{body}</span>"),
        None => body,
    }
}

/// Highlight `code`, returning one HTML fragment per source line.
pub fn highlight_lines(code: &str, query: Option<&str>) -> Vec<String> {
    let mut lines = vec![String::new()];
    for token in tokenize(code) {
        if token.kind == TokenKind::Newline {
            lines.push(String::new());
        } else if let Some(line) = lines.last_mut() {
            line.push_str(&highlight_token(&token, query));
        }
    }
    lines
}

/// Single-line HTML rendering; newlines become spaces.
pub fn highlight_inline(code: &str) -> String {
    tokenize(code)
        .iter()
        .map(|token| match token.kind {
            TokenKind::Newline => " ".to_string(),
            _ => highlight_token(token, None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_token(code: &str) -> Token<'_> {
        tokenize(code)[0]
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a < b && "c" > d"#), "a &lt; b &amp;&amp; &quot;c&quot; &gt; d");
    }

    #[test]
    fn test_token_classes() {
        assert_eq!(
            highlight_token(&first_token("select"), None),
            "<span class=\"nx-keyword\">select</span>"
        );
        assert_eq!(highlight_token(&first_token("   "), None), "   ");
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert_eq!(
            highlight_token(&first_token("SELECT"), Some("lec")),
            "<span class=\"nx-keyword\">SE<span class=\"nx-highlight\">LEC</span>T</span>"
        );
    }

    #[test]
    fn test_match_parts_escaped_once() {
        let token = first_token(r#""a<b&c""#);
        assert_eq!(
            highlight_token(&token, Some("<B")),
            "<span class=\"nx-string\">&quot;a<span class=\"nx-highlight\">&lt;b</span>&amp;c&quot;</span>"
        );
    }

    #[test]
    fn test_only_first_match_wrapped() {
        let html = highlight_token(&first_token("'aXa'"), Some("a"));
        assert_eq!(html.matches(HIGHLIGHT_CLASS).count(), 1);
    }

    #[test]
    fn test_find_ignore_case_non_ascii() {
        assert_eq!(find_ignore_case("Größe", "SSE"), None);
        assert_eq!(find_ignore_case("MÜLLER", "ül"), Some((1, 4)));
        assert_eq!(find_ignore_case("abc", ""), None);
        assert_eq!(find_ignore_case("ab", "abc"), None);
    }

    #[test]
    fn test_highlight_lines() {
        let lines = highlight_lines("let a := 1;\n// note", Some("note"));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("<span class=\"nx-keyword\">let</span>"));
        assert_eq!(
            lines[1],
            "<span class=\"nx-comment\">// <span class=\"nx-highlight\">note</span></span>"
        );
    }

    #[test]
    fn test_highlight_inline() {
        assert_eq!(
            highlight_inline("a\nb"),
            "<span class=\"nx-identifier\">a</span> <span class=\"nx-identifier\">b</span>"
        );
    }

    #[test]
    fn test_empty_input_and_query() {
        assert_eq!(highlight_lines("", None), vec![String::new()]);
        assert_eq!(highlight_lines("", Some("x")), vec![String::new()]);
        assert_eq!(highlight_inline(""), "");

        let code = "let a := 1;\nalert(a)";
        let plain = highlight_lines(code, None);
        assert_eq!(highlight_lines(code, Some("")), plain);
        assert!(plain.iter().all(|line| !line.contains(HIGHLIGHT_CLASS)));
        assert!(!highlight_inline(code).contains(HIGHLIGHT_CLASS));
    }
}
