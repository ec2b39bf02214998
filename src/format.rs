//! Code formatter - re-indents Ninox scripts from the token stream

use crate::token::{Token, TokenKind, tokenize};

/// Default number of spaces per indentation level
pub const DEFAULT_INDENT: usize = 4;

const INDENT_AFTER: &[&str] = &["do", "then"];
const DEDENT_BEFORE: &[&str] = &["end", "else"];
const OWN_LINE: &[&str] = &["let", "for", "if", "switch", "case", "else", "end"];

fn keyword_in(token: &Token<'_>, words: &[&str]) -> bool {
    token.kind == TokenKind::Keyword && words.iter().any(|w| token.text.eq_ignore_ascii_case(w))
}

/// Re-indent `code` using [`DEFAULT_INDENT`].
pub fn format_code(code: &str) -> String {
    format_code_with(code, DEFAULT_INDENT)
}

/// Re-indent `code` with `indent` spaces per level.
pub fn format_code_with(code: &str, indent: usize) -> String {
    let mut out = Formatter::new(indent);

    for token in tokenize(code) {
        if keyword_in(&token, DEDENT_BEFORE) || token.is(TokenKind::Punctuation, "}") {
            out.level = out.level.saturating_sub(1);
        }

        match token.kind {
            TokenKind::Newline => {
                if out.absorb_newline {
                    out.absorb_newline = false;
                } else {
                    out.break_line();
                }
                continue;
            }
            TokenKind::Whitespace => {
                if !out.line_start {
                    out.buf.push_str(token.text);
                }
                continue;
            }
            _ => {}
        }

        let starts_line =
            keyword_in(&token, OWN_LINE) || token.is(TokenKind::Punctuation, "}");
        if starts_line && !out.line_start {
            out.break_line();
        }
        out.push(token.text);

        if keyword_in(&token, INDENT_AFTER) || token.is(TokenKind::Punctuation, "{") {
            out.level += 1;
            out.forced_break();
        } else if token.is(TokenKind::Punctuation, ";") {
            out.forced_break();
        }
    }

    out.buf.trim().to_string()
}

struct Formatter {
    buf: String,
    indent: usize,
    level: usize,
    /// Nothing but indentation has been written on the current line
    line_start: bool,
    /// The last break was inserted by the formatter; a source newline right after it is dropped
    absorb_newline: bool,
}

impl Formatter {
    fn new(indent: usize) -> Self {
        Self {
            buf: String::new(),
            indent,
            level: 0,
            line_start: true,
            absorb_newline: false,
        }
    }

    fn push(&mut self, text: &str) {
        if self.line_start {
            self.buf.extend(std::iter::repeat_n(' ', self.level * self.indent));
            self.line_start = false;
        }
        self.buf.push_str(text);
        self.absorb_newline = false;
    }

    fn break_line(&mut self) {
        let trimmed = self.buf.trim_end_matches([' ', '\t', '\r']).len();
        self.buf.truncate(trimmed);
        self.buf.push('\n');
        self.line_start = true;
    }

    fn forced_break(&mut self) {
        self.break_line();
        self.absorb_newline = true;
    }
}

/// One-line preview of `code`: whitespace collapsed, cut to `max_chars` with a trailing `...`.
pub fn code_preview(code: &str, max_chars: usize) -> String {
    let collapsed = code.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let keep = max_chars.saturating_sub(3);
    let mut preview: String = collapsed.chars().take(keep).collect();
    preview.push_str("...");
    preview
}
