//! # ninox-schema - Ninox schema & script index
//!
//! Reads the schema trees Ninox exports for each database and turns them into a
//! searchable local index.
//!
//! ninox-schema provides:
//! - A tokenizer, formatter and HTML highlighter for the Ninox scripting language
//! - A schema ingestor producing tables, fields and the embedded scripts
//! - Static extraction of table relationships and cross-database script dependencies
//! - SQLite-backed storage with an FTS5 full-text index over all scripts

pub mod token;
pub mod format;
pub mod highlight;
pub mod schema;
pub mod model;
pub mod script;
pub mod relationship;
pub mod graph;
pub mod ingest;
pub mod linker;
pub mod storage;
pub mod source;
pub mod extract;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use token::{Token, TokenKind, tokenize};
pub use format::format_code;
pub use script::{CodeCategory, Script, TeamInfo};
pub use relationship::{CrossDbKind, Relationship, RelationshipKind, ScriptDependency};
pub use graph::{GraphStats, RelationshipSet};
pub use linker::{LinkOptions, ScanMode};
pub use source::{DatabaseRef, DumpDirSource, MemorySource, SchemaSource};
pub use extract::{ExtractContext, ExtractionStats};
pub use storage::SqliteStore;

/// Result type alias for ninox-schema operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ninox-schema operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    #[error("Malformed schema for database {database}: {source}")]
    MalformedSchema {
        database: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid kind: {0}")]
    InvalidKind(String),
}
