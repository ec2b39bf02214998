//! Schema sources
//!
//! Where database listings and schema documents come from. The extractor only sees the
//! [`SchemaSource`] trait; failures surface as [`Error::Transport`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// File holding the database listing inside a dump directory
pub const LISTING_FILE: &str = "databases.json";

/// One entry of a team's database listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl DatabaseRef {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }
}

/// Trait for schema sources
pub trait SchemaSource {
    /// Databases of the team, in listing order
    fn list_databases(&self) -> Result<Vec<DatabaseRef>>;

    /// Raw schema document of one database
    fn fetch_schema(&self, database_id: &str) -> Result<Value>;
}

/// Reads schema dumps from a directory: `databases.json` is the listing and
/// `<id>.json` the schema of each database.
///
/// Without a listing file every `*.json` file in the directory is taken as a database
/// whose ID is the file stem.
#[derive(Debug, Clone)]
pub struct DumpDirSource {
    dir: PathBuf,
}

impl DumpDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_json(path: &Path) -> Result<Value> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Transport(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| Error::Transport(format!("{}: {}", path.display(), e)))
    }

    fn scan_dir(&self) -> Result<Vec<DatabaseRef>> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| Error::Transport(format!("{}: {}", self.dir.display(), e)))?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids.into_iter().map(|id| DatabaseRef::new(id, None)).collect())
    }
}

impl SchemaSource for DumpDirSource {
    fn list_databases(&self) -> Result<Vec<DatabaseRef>> {
        let listing = self.dir.join(LISTING_FILE);
        if !listing.exists() {
            return self.scan_dir();
        }
        let value = Self::read_json(&listing)?;
        serde_json::from_value(value)
            .map_err(|e| Error::Transport(format!("{}: {}", listing.display(), e)))
    }

    fn fetch_schema(&self, database_id: &str) -> Result<Value> {
        if database_id.is_empty() || database_id.contains(['/', '\\']) || database_id.contains("..") {
            return Err(Error::Transport(format!("Invalid database id: {database_id:?}")));
        }
        Self::read_json(&self.dir.join(format!("{database_id}.json")))
    }
}

/// In-memory source. Databases registered without a schema are listed but fail to fetch.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    listing: Vec<DatabaseRef>,
    schemas: HashMap<String, Value>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, id: &str, name: Option<&str>, schema: Value) -> Self {
        self.listing.push(DatabaseRef::new(id, name));
        self.schemas.insert(id.to_string(), schema);
        self
    }

    pub fn with_unavailable(mut self, id: &str, name: Option<&str>) -> Self {
        self.listing.push(DatabaseRef::new(id, name));
        self
    }
}

impl SchemaSource for MemorySource {
    fn list_databases(&self) -> Result<Vec<DatabaseRef>> {
        Ok(self.listing.clone())
    }

    fn fetch_schema(&self, database_id: &str) -> Result<Value> {
        self.schemas
            .get(database_id)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("Schema unavailable: {database_id}")))
    }
}
