//! Ninox code for the terminal

use std::fmt::Write;

use owo_colors::OwoColorize;

use crate::storage::sqlite::{MATCH_CLOSE, MATCH_OPEN};
use crate::token::tokenize;
use crate::ui::Theme;

/// Color every token of `code` by kind.
pub fn render_code(code: &str, theme: &Theme) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    for token in tokenize(code) {
        match theme.token(token.kind) {
            Some(style) => {
                let _ = write!(out, "{}", token.text.style(style));
            }
            None => out.push_str(token.text),
        }
    }
    out
}

/// Replace the match markers of a search excerpt with the `matched` style.
pub fn render_excerpt(excerpt: &str, theme: &Theme) -> String {
    let mut out = String::with_capacity(excerpt.len());
    let mut rest = excerpt;
    while let Some(open) = rest.find(MATCH_OPEN) {
        out.push_str(&rest[..open]);
        let after = &rest[open + MATCH_OPEN.len()..];
        let Some(close) = after.find(MATCH_CLOSE) else {
            rest = after;
            break;
        };
        let _ = write!(out, "{}", (&after[..close]).style(theme.matched.clone()));
        rest = &after[close + MATCH_CLOSE.len()..];
    }
    out.push_str(rest);
    out
}

/// Lines prefixed with right-aligned 1-based line numbers.
pub fn numbered(code: &str, theme: &Theme) -> String {
    let lines: Vec<&str> = code.lines().collect();
    let width = lines.len().to_string().len();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{} {}", format!("{:>width$}", i + 1).style(theme.muted.clone()), line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use console::strip_ansi_codes;

    #[test]
    fn test_render_code_keeps_text() {
        let code = "let x := select Kunden where A = \"a\"; // c";
        let colored = render_code(code, &Theme::colored());
        assert!(colored.contains('\x1b'));
        assert_eq!(strip_ansi_codes(&colored), code);
        assert_eq!(strip_ansi_codes(&render_code(code, &Theme::plain())), code);
    }

    #[test]
    fn test_render_excerpt() {
        let plain = render_excerpt("a >>>b<<< c >>>d<<<", &Theme::colored());
        assert_eq!(strip_ansi_codes(&plain), "a b c d");
        assert_eq!(render_excerpt("no markers", &Theme::plain()), "no markers");
        assert_eq!(strip_ansi_codes(&render_excerpt("x >>>y", &Theme::plain())), "x y");
    }

    #[test]
    fn test_numbered() {
        let code = (1..=10).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let out = numbered(&code, &Theme::colored());
        let lines: Vec<String> = out.lines().map(|l| strip_ansi_codes(l).to_string()).collect();
        assert_eq!(lines[0], " 1 1");
        assert_eq!(lines[9], "10 10");
    }
}
