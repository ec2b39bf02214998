//! Cross-database references in scripts
//!
//! `do as database '<name>'`, `do as server` and `openDatabase('<name>')`. Each match
//! keeps a whitespace-normalized snippet of the surrounding text.

use std::sync::LazyLock;

use regex::Regex;

use crate::relationship::{CrossDbKind, SERVER_TARGET, ScriptDependency};
use crate::script::Script;

static DO_AS_DATABASE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)\bdo\s+as\s+database\s+['"]([^'"]+)['"]"#).ok());
static DO_AS_SERVER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bdo\s+as\s+server\b").ok());
static OPEN_DATABASE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)\bopenDatabase\s*\(\s*['"]([^'"]+)['"]"#).ok());

/// Characters kept before a match
const BEFORE: usize = 20;
/// Characters kept after `do as ...` matches
const AFTER_DO_AS: usize = 50;
/// Characters kept after `openDatabase(...` matches
const AFTER_OPEN: usize = 30;

/// One cross-database reference found in a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossDbReference {
    pub target: String,
    pub kind: CrossDbKind,
    pub snippet: String,
}

impl CrossDbReference {
    /// Attach the reference to the script it was found in.
    pub fn into_dependency(self, script: &Script) -> ScriptDependency {
        ScriptDependency {
            script_id: script.id,
            source_database_id: script.database_id.clone(),
            source_database_name: script.database_name.clone(),
            target_database_name: self.target,
            reference_type: self.kind,
            code_snippet: self.snippet,
        }
    }
}

/// `code[start..end]` widened by up to `before` characters on the left and `after` on the right.
fn window(code: &str, start: usize, end: usize, before: usize, after: usize) -> &str {
    let from = code[..start]
        .char_indices()
        .rev()
        .take(before)
        .last()
        .map_or(start, |(i, _)| i);
    let to = code[end..]
        .char_indices()
        .nth(after)
        .map_or(code.len(), |(i, _)| end + i);
    &code[from..to]
}

fn normalize(snippet: &str) -> String {
    snippet.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Matches of a pattern whose first group names the target database.
fn named_references(
    code: &str,
    pattern: Option<&Regex>,
    kind: CrossDbKind,
    after: usize,
) -> Vec<CrossDbReference> {
    let Some(pattern) = pattern else {
        return Vec::new();
    };
    pattern
        .captures_iter(code)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let target = captures.get(1)?;
            Some(CrossDbReference {
                target: target.as_str().to_string(),
                kind,
                snippet: normalize(window(code, whole.start(), whole.end(), BEFORE, after)),
            })
        })
        .collect()
}

/// All cross-database references in `code`: database blocks first, then server blocks,
/// then `openDatabase` calls, each in source order.
pub fn database_references(code: &str) -> Vec<CrossDbReference> {
    let mut references = named_references(
        code,
        DO_AS_DATABASE.as_ref(),
        CrossDbKind::DoAsDatabase,
        AFTER_DO_AS,
    );

    if let Some(pattern) = DO_AS_SERVER.as_ref() {
        references.extend(pattern.find_iter(code).map(|found| CrossDbReference {
            target: SERVER_TARGET.to_string(),
            kind: CrossDbKind::DoAsServer,
            snippet: normalize(window(code, found.start(), found.end(), BEFORE, AFTER_DO_AS)),
        }));
    }

    references.extend(named_references(
        code,
        OPEN_DATABASE.as_ref(),
        CrossDbKind::OpenDatabase,
        AFTER_OPEN,
    ));
    references
}
