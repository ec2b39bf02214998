//! Reference and dependency extraction
//!
//! Three passes over an ingested database:
//! - [`structural`]: reference fields → `N:1` / `CROSS_DB`
//! - [`formula`]: table mentions in scripts → `FORMULA_REF`
//! - [`cross_db`]: `do as database`, `do as server` and `openDatabase` → script dependencies
//!
//! The script passes are lexical. They may report names that are not tables and miss
//! references built dynamically.

pub mod cross_db;
pub mod formula;
pub mod structural;

use std::borrow::Cow;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::graph::RelationshipSet;
use crate::ingest::IngestedDatabase;
use crate::relationship::ScriptDependency;
use crate::token::{TokenKind, tokenize};

pub use cross_db::{CrossDbReference, database_references};
pub use formula::table_references;
pub use structural::structural_relationships;

/// Characters of a script kept as `found_in_code` on formula references
pub const DEFAULT_SNIPPET_CHARS: usize = 500;

/// What part of a script the pattern passes look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// The whole text, comments and strings included
    #[default]
    Raw,
    /// Comments blanked out first; strings are kept since quoted names are matched
    CodeOnly,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Raw => "raw",
            ScanMode::CodeOnly => "code-only",
        }
    }

    /// Text the patterns run over.
    pub fn scan_text<'a>(&self, code: &'a str) -> Cow<'a, str> {
        match self {
            ScanMode::Raw => Cow::Borrowed(code),
            ScanMode::CodeOnly => mask_comments(code),
        }
    }
}

impl FromStr for ScanMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(ScanMode::Raw),
            "code-only" | "code_only" | "code" => Ok(ScanMode::CodeOnly),
            _ => Err(crate::Error::InvalidKind(format!("Unknown scan mode: {}", s))),
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Replace every comment token with spaces, keeping line breaks.
fn mask_comments(code: &str) -> Cow<'_, str> {
    let tokens = tokenize(code);
    if !tokens.iter().any(|t| t.kind == TokenKind::Comment) {
        return Cow::Borrowed(code);
    }
    let mut masked = String::with_capacity(code.len());
    for token in tokens {
        if token.kind == TokenKind::Comment {
            masked.extend(token.text.chars().map(|c| if c == '\n' { '\n' } else { ' ' }));
        } else {
            masked.push_str(token.text);
        }
    }
    Cow::Owned(masked)
}

/// Options for the script passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    pub scan_mode: ScanMode,
    pub snippet_chars: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            scan_mode: ScanMode::Raw,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

/// Everything the passes found in one database.
#[derive(Debug, Default)]
pub struct Links {
    pub relationships: RelationshipSet,
    /// Dependencies keyed by the index of their script in `IngestedDatabase::scripts`
    pub dependencies: Vec<(usize, ScriptDependency)>,
}

/// Run all passes over one ingested database.
///
/// Structural relationships come first, then formula references in script order;
/// the first detection of an identity is kept.
pub fn link(ingested: &IngestedDatabase, options: &LinkOptions) -> Links {
    let mut links = Links::default();
    links.relationships.extend(structural_relationships(ingested));

    for (index, script) in ingested.scripts.iter().enumerate() {
        let text = options.scan_mode.scan_text(script.code());

        links
            .relationships
            .extend(formula::script_relationships(script, &text, &ingested.index, options.snippet_chars));

        for reference in database_references(&text) {
            links.dependencies.push((index, reference.into_dependency(script)));
        }
    }

    links
}
