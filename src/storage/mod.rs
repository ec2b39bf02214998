//! Storage Layer - SQLite-backed persistence
//!
//! Tables:
//! - databases(id, name, version, color, icon)
//! - tables(database_id, table_id, name, caption, ...)
//! - fields(database_id, table_id, field_id, name, base_type, ref_*, ...)
//! - relationships(database_id, source_*, target_*, relationship_type, found_in_*)
//! - scripts(team_*, database_*, table_*, element_*, code_type, code_category, code)
//! - script_dependencies(script_id, source_database_*, target_database_name, reference_type)
//!
//! `scripts_fts` is an FTS5 mirror of `scripts` kept current by triggers.

pub mod schema;
pub mod sqlite;

pub use sqlite::{
    DatabaseExport, Export, RefreshTx, RelationshipFilter, SearchFilter, SearchHit, SqliteStore,
    Statistics, TableDependencies, WriteStats,
};
