//! Tokenizer for the Ninox scripting language
//!
//! Scans raw script text into an ordered, gap-free token stream. Concatenating the
//! text of every token reproduces the input exactly; the scanner never fails, any
//! character it does not recognize becomes a one-character identifier.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Keyword,
    Operator,
    String,
    Number,
    Comment,
    /// Builtin function name directly followed by `(`
    Builtin,
    /// Short upper-case field ID (`A`, `B3`)
    Field,
    /// Short upper-case table ID followed by `.`
    Table,
    Punctuation,
    Identifier,
    /// Spaces, tabs and carriage returns
    Whitespace,
    Newline,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Operator => "operator",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Comment => "comment",
            TokenKind::Builtin => "builtin",
            TokenKind::Field => "field",
            TokenKind::Table => "table",
            TokenKind::Punctuation => "punctuation",
            TokenKind::Identifier => "identifier",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Newline => "newline",
        }
    }

    /// Whitespace and newlines carry no meaning for formatting decisions.
    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Newline)
    }
}

/// A token borrowing its text from the scanned input.
///
/// `start`/`end` are byte offsets, `text == &input[start..end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Token<'a> {
    /// True for a keyword or punctuation token whose text equals `word` (ASCII case-insensitive).
    pub fn is(&self, kind: TokenKind, word: &str) -> bool {
        self.kind == kind && self.text.eq_ignore_ascii_case(word)
    }
}

const KEYWORDS: &[&str] = &[
    // control flow
    "if", "then", "else", "end", "switch", "case", "default", "for", "do", "while", "break",
    "continue", "try", "catch", "throw",
    // declarations
    "let", "var", "function",
    // word operators
    "and", "or", "not", "in", "like",
    // values
    "true", "false", "null", "this", "me",
    // context modifiers
    "as", "database", "server", "transaction", "user",
    // data operations
    "select", "from", "where", "order", "by", "group", "limit", "asc", "desc", "distinct",
];

const BUILTINS: &[&str] = &[
    // records
    "create", "delete", "duplicate", "record", "records", "first", "last", "item", "count", "sum",
    "avg", "min", "max",
    // strings
    "text", "number", "upper", "lower", "trim", "length", "substr", "replace", "split", "join",
    "contains", "format", "formatNumber", "parseNumber",
    // dates
    "today", "now", "date", "time", "datetime", "year", "month", "day", "hour", "minute",
    "second", "weekday", "week", "quarter", "dateAdd", "dateDiff", "dateFormat", "startOfDay",
    "endOfDay", "startOfWeek", "endOfWeek", "startOfMonth", "endOfMonth", "startOfYear",
    "endOfYear",
    // math
    "abs", "ceil", "floor", "round", "sqrt", "pow", "sin", "cos", "tan", "asin", "acos", "atan",
    "log", "exp", "random",
    // arrays
    "array", "unique", "sort", "reverse", "slice", "concat", "indexOf", "includes", "filter",
    "map",
    // ui
    "alert", "confirm", "prompt", "dialog", "popupRecord", "openRecord", "closePopup",
    "openPrintLayout", "printRecord", "setStyle", "getStyle", "focus", "blur",
    // files
    "importFile", "exportFile", "downloadFile", "importCSV", "importJSON", "exportCSV",
    "exportJSON",
    // http & mail
    "http", "httpGet", "httpPost", "httpPut", "httpDelete", "sendEmail", "email",
    // utility
    "debug", "print", "sleep", "eval", "typeof", "isnull", "isempty", "coalesce", "choose",
    "switch",
    // navigation
    "navigate", "openUrl", "openTable", "openView",
    // user
    "userId", "userName", "userEmail", "userRoles", "hasRole", "isAdmin",
    // database info
    "databaseId", "databaseName", "tableId", "tableName", "fieldId", "fieldName",
    // archive & clipboard
    "archive", "unarchive", "isArchived", "copyToClipboard", "readFromClipboard",
    // json, colors, location
    "parseJSON", "formatJSON", "json", "rgb", "rgba", "hex", "color", "location", "geoDistance",
];

static KEYWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| KEYWORDS.iter().copied().collect());

static BUILTIN_SET: LazyLock<HashSet<String>> =
    LazyLock::new(|| BUILTINS.iter().map(|b| b.to_ascii_lowercase()).collect());

/// Check whether `word` is a reserved word (case-insensitive).
pub fn is_keyword(word: &str) -> bool {
    KEYWORD_SET.contains(word.to_ascii_lowercase().as_str())
}

/// Check whether `word` names a builtin function (case-insensitive).
pub fn is_builtin(word: &str) -> bool {
    BUILTIN_SET.contains(&word.to_ascii_lowercase())
}

/// Ninox internal identity: one upper-case letter plus up to three upper-case letters or digits.
pub fn is_identity(word: &str) -> bool {
    let bytes = word.as_bytes();
    (1..=4).contains(&bytes.len())
        && bytes[0].is_ascii_uppercase()
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Tokenize Ninox code.
pub fn tokenize(code: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < code.len() {
        let rest = &code[pos..];
        let (kind, len) = scan(rest);
        tokens.push(Token {
            kind,
            text: &rest[..len],
            start: pos,
            end: pos + len,
        });
        pos += len;
    }

    tokens
}

/// Scan one token at the start of `rest` (never empty), returning its kind and byte length.
fn scan(rest: &str) -> (TokenKind, usize) {
    let Some(c) = rest.chars().next() else {
        return (TokenKind::Identifier, 0);
    };
    let bytes = rest.as_bytes();

    match c {
        '\n' => (TokenKind::Newline, 1),
        ' ' | '\t' | '\r' => {
            let len = rest
                .find(|ch: char| !matches!(ch, ' ' | '\t' | '\r'))
                .unwrap_or(rest.len());
            (TokenKind::Whitespace, len)
        }
        _ if rest.starts_with("//") => (TokenKind::Comment, rest.find('\n').unwrap_or(rest.len())),
        _ if rest.starts_with("---") => {
            let len = rest[3..]
                .find("---")
                .map(|i| i + 6)
                .unwrap_or(rest.len());
            (TokenKind::Comment, len)
        }
        '"' | '\'' => (TokenKind::String, scan_string(rest, c)),
        _ if c.is_ascii_digit()
            || (c == '.' && bytes.get(1).is_some_and(|b| b.is_ascii_digit())) =>
        {
            (TokenKind::Number, scan_number(bytes))
        }
        _ if rest.starts_with(":=") => (TokenKind::Operator, 2),
        _ if ["<=", ">=", "!=", "<>"].iter().any(|op| rest.starts_with(op)) => {
            (TokenKind::Operator, 2)
        }
        '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' => (TokenKind::Operator, 1),
        '(' | ')' | '[' | ']' | '{' | '}' | ',' | '.' | ';' | ':' => (TokenKind::Punctuation, 1),
        _ if c.is_alphabetic() || c == '_' => {
            let len = rest
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            (classify_word(&rest[..len], &rest[len..]), len)
        }
        _ => (TokenKind::Identifier, c.len_utf8()),
    }
}

/// Length of a string literal opened by `quote`; unterminated strings run to end of input.
fn scan_string(rest: &str, quote: char) -> usize {
    let mut chars = rest.char_indices().skip(1);
    while let Some((i, ch)) = chars.next() {
        if ch == '\\' {
            if chars.next().is_none() {
                return rest.len();
            }
        } else if ch == quote {
            return i + ch.len_utf8();
        }
    }
    rest.len()
}

fn scan_number(bytes: &[u8]) -> usize {
    let mut end = 0;
    let mut has_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !has_dot => {
                has_dot = true;
                end += 1;
            }
            b'e' | b'E'
                if bytes
                    .get(end + 1)
                    .is_some_and(|b| b.is_ascii_digit() || *b == b'+' || *b == b'-') =>
            {
                end += 1;
                if matches!(bytes[end], b'+' | b'-') {
                    end += 1;
                }
            }
            _ => break,
        }
    }
    end
}

/// Classify an identifier-like word using what follows it.
fn classify_word(word: &str, after: &str) -> TokenKind {
    let next = after.trim_start_matches([' ', '\t']).chars().next();

    if is_keyword(word) {
        TokenKind::Keyword
    } else if is_builtin(word) && next == Some('(') {
        TokenKind::Builtin
    } else if is_identity(word) {
        if next == Some('.') {
            TokenKind::Table
        } else {
            TokenKind::Field
        }
    } else {
        TokenKind::Identifier
    }
}
