//! SQLite storage implementation

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use serde::Serialize;
use tracing::{debug, warn};

use super::schema;
use crate::ingest::IngestedDatabase;
use crate::linker::Links;
use crate::model::{Database, DatabaseSummary, Field, Table};
use crate::relationship::{Relationship, RelationshipKind, ScriptDependency};
use crate::script::{Script, TeamInfo};
use crate::{Error, Result};

/// Markers `highlight()` puts around matched terms
pub const MATCH_OPEN: &str = ">>>";
pub const MATCH_CLOSE: &str = "<<<";

/// Rows in the "top tables by script count" statistic
pub const TOP_TABLES: usize = 10;

const SCRIPT_COLUMNS: &str = "s.id, s.team_id, s.team_name, s.database_id, s.database_name, \
     s.table_id, s.table_name, s.element_id, s.element_name, s.code_type, s.code_category, s.code";

const RELATIONSHIP_COLUMNS: &str = "database_id, database_name, source_table_id, source_table_name, \
     source_field_id, source_field_name, target_table_id, target_table_name, target_database_id, \
     target_database_name, relationship_type, is_composition, found_in_code_type, found_in_code";

const TABLE_COLUMNS: &str = "database_id, table_id, name, caption, icon, hidden, field_count";

const FIELD_COLUMNS: &str = "database_id, table_id, field_id, name, base_type, is_required, \
     ref_table_id, ref_table_name, ref_database_id, ref_database_name, is_composition, has_formula";

const DEPENDENCY_COLUMNS: &str = "script_id, source_database_id, source_database_name, \
     target_database_name, reference_type, code_snippet";

/// Files SQLite may keep next to a store
const STORE_SIDE_FILES: &[&str] = &["-wal", "-shm", "-journal"];

/// SQLite-backed storage for extracted schemas and scripts
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open a store that is about to be refreshed.
    ///
    /// An existing file is checked first (`PRAGMA integrity_check` and the search index
    /// integrity check). If either fails, the file and its side files are deleted and an
    /// empty store is created in their place.
    pub fn open_for_refresh(path: &Path) -> Result<Self> {
        if path.exists() {
            let verdict = Connection::open(path)
                .map_err(Error::from)
                .and_then(|conn| check_consistency(&conn));
            if let Err(e) = verdict {
                warn!(path = %path.display(), error = %e, "Store failed its consistency check, rebuilding");
                remove_store_files(path)?;
            }
        }
        Self::open(path)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", true)?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// Run the consistency checks against this store.
    pub fn verify_search_index(&self) -> Result<()> {
        check_consistency(&self.conn)
    }

    // ========== Refresh ==========

    /// Start a full refresh: one transaction that first deletes every extracted row.
    ///
    /// Nothing becomes visible to other connections until [`RefreshTx::commit`]; dropping
    /// the returned value rolls the whole refresh back.
    pub fn begin_refresh(&mut self) -> Result<RefreshTx<'_>> {
        let tx = self.conn.transaction()?;
        for table in schema::CLEAR_ORDER {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        debug!("Cleared store for refresh");
        Ok(RefreshTx { tx })
    }

    // ========== Search ==========

    /// Full-text search over scripts.
    ///
    /// Results are ranked by FTS5 `rank`. A query the full-text engine rejects is run as a
    /// case-insensitive substring scan over code, table and element names instead; those
    /// hits carry no rank and no highlighted excerpt.
    pub fn search(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<SearchHit>> {
        match self.search_fts(query, filter, limit) {
            Ok(hits) => Ok(hits),
            Err(e) => {
                warn!(query, error = %e, "Full-text query failed, falling back to substring search");
                self.search_like(query, filter, limit)
            }
        }
    }

    fn search_fts(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<SearchHit>> {
        let mut sql = format!(
            "SELECT {SCRIPT_COLUMNS}, scripts_fts.rank, highlight(scripts_fts, 0, '{MATCH_OPEN}', '{MATCH_CLOSE}')
             FROM scripts_fts JOIN scripts s ON s.id = scripts_fts.rowid
             WHERE scripts_fts MATCH ?"
        );
        let mut values = vec![Value::Text(query.to_string())];
        filter.apply(&mut sql, &mut values);
        sql.push_str(" ORDER BY scripts_fts.rank LIMIT ?");
        values.push(Value::Integer(limit as i64));

        query_all(&self.conn, &sql, params_from_iter(values), |row| {
            Ok(SearchHit {
                script: row_to_script(row)?,
                rank: row.get(12)?,
                highlighted: row.get(13)?,
            })
        })
    }

    fn search_like(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<SearchHit>> {
        let pattern = format!("%{}%", escape_like(query));
        let mut sql = format!(
            "SELECT {SCRIPT_COLUMNS} FROM scripts s
             WHERE (s.code LIKE ? ESCAPE '\\' OR s.table_name LIKE ? ESCAPE '\\' OR s.element_name LIKE ? ESCAPE '\\')"
        );
        let mut values = vec![Value::Text(pattern); 3];
        filter.apply(&mut sql, &mut values);
        sql.push_str(" ORDER BY s.database_name, s.table_name LIMIT ?");
        values.push(Value::Integer(limit as i64));

        query_all(&self.conn, &sql, params_from_iter(values), |row| {
            Ok(SearchHit {
                script: row_to_script(row)?,
                rank: None,
                highlighted: None,
            })
        })
    }

    /// Get a script by row ID
    pub fn script(&self, id: i64) -> Result<Option<Script>> {
        self.conn
            .query_row(
                &format!("SELECT {SCRIPT_COLUMNS} FROM scripts s WHERE s.id = ?1"),
                [id],
                row_to_script,
            )
            .optional()
            .map_err(Into::into)
    }

    // ========== Relationships ==========

    /// Structural and formula relationships of a table.
    ///
    /// `references` and `referenced_by` never contain `FORMULA_REF` rows;
    /// `formula_references` contains nothing else.
    pub fn dependencies(&self, table_name: &str) -> Result<TableDependencies> {
        let formula = RelationshipKind::FormulaRef.as_str();
        let select = |condition: &str| {
            query_all(
                &self.conn,
                &format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE {condition} ORDER BY id"),
                params![table_name, formula],
                row_to_relationship,
            )
        };

        Ok(TableDependencies {
            references: select("source_table_name = ?1 AND relationship_type != ?2")?,
            referenced_by: select("target_table_name = ?1 AND relationship_type != ?2")?,
            formula_references: select(
                "(source_table_name = ?1 OR target_table_name = ?1) AND relationship_type = ?2",
            )?,
        })
    }

    /// Relationships matching `filter`, ordered by source and target table
    pub fn relationships(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        let mut sql = format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE 1=1");
        let mut values = Vec::new();

        if let Some(database) = &filter.database {
            sql.push_str(" AND (database_id = ? OR database_name = ?)");
            values.push(Value::Text(database.clone()));
            values.push(Value::Text(database.clone()));
        }
        if let Some(table) = &filter.table {
            sql.push_str(" AND (source_table_name = ? OR target_table_name = ?)");
            values.push(Value::Text(table.clone()));
            values.push(Value::Text(table.clone()));
        }
        if let Some(kind) = filter.kind {
            sql.push_str(" AND relationship_type = ?");
            values.push(Value::Text(kind.as_str().to_string()));
        }
        if filter.exclude_formula_refs {
            sql.push_str(" AND relationship_type != ?");
            values.push(Value::Text(RelationshipKind::FormulaRef.as_str().to_string()));
        }
        sql.push_str(" ORDER BY source_table_name, target_table_name");

        query_all(&self.conn, &sql, params_from_iter(values), row_to_relationship)
    }

    /// Cross-database script dependencies, optionally of one source database (ID or name)
    pub fn script_dependencies(&self, database: Option<&str>) -> Result<Vec<ScriptDependency>> {
        let order = "ORDER BY source_database_name, target_database_name, script_id";
        match database {
            Some(database) => query_all(
                &self.conn,
                &format!(
                    "SELECT {DEPENDENCY_COLUMNS} FROM script_dependencies
                     WHERE source_database_id = ?1 OR source_database_name = ?1 {order}"
                ),
                [database],
                row_to_dependency,
            ),
            None => query_all(
                &self.conn,
                &format!("SELECT {DEPENDENCY_COLUMNS} FROM script_dependencies {order}"),
                [],
                row_to_dependency,
            ),
        }
    }

    // ========== Listings ==========

    /// All databases with their table and script counts, by name
    pub fn list_databases(&self) -> Result<Vec<DatabaseSummary>> {
        query_all(
            &self.conn,
            "SELECT d.id, d.name, d.version, d.color, d.icon,
                    (SELECT COUNT(*) FROM tables t WHERE t.database_id = d.id),
                    (SELECT COUNT(*) FROM scripts s WHERE s.database_id = d.id)
             FROM databases d ORDER BY d.name",
            [],
            |row| {
                Ok(DatabaseSummary {
                    database: row_to_database(row)?,
                    table_count: row.get::<_, i64>(5)? as usize,
                    script_count: row.get::<_, i64>(6)? as usize,
                })
            },
        )
    }

    /// Tables of one database, or of all databases
    pub fn list_tables(&self, database_id: Option<&str>) -> Result<Vec<Table>> {
        match database_id {
            Some(id) => query_all(
                &self.conn,
                &format!("SELECT {TABLE_COLUMNS} FROM tables WHERE database_id = ?1 ORDER BY name"),
                [id],
                row_to_table,
            ),
            None => query_all(
                &self.conn,
                &format!("SELECT {TABLE_COLUMNS} FROM tables ORDER BY database_id, name"),
                [],
                row_to_table,
            ),
        }
    }

    /// The full entity graph of one database, or of all databases.
    pub fn export(&self, database_id: Option<&str>) -> Result<Export> {
        let databases = match database_id {
            Some(id) => query_all(
                &self.conn,
                "SELECT id, name, version, color, icon FROM databases WHERE id = ?1",
                [id],
                row_to_database,
            )?,
            None => query_all(
                &self.conn,
                "SELECT id, name, version, color, icon FROM databases ORDER BY name",
                [],
                row_to_database,
            )?,
        };

        let mut exported = Vec::with_capacity(databases.len());
        for database in databases {
            let id = database.id.clone();
            exported.push(DatabaseExport {
                tables: query_all(
                    &self.conn,
                    &format!("SELECT {TABLE_COLUMNS} FROM tables WHERE database_id = ?1 ORDER BY id"),
                    [&id],
                    row_to_table,
                )?,
                fields: query_all(
                    &self.conn,
                    &format!("SELECT {FIELD_COLUMNS} FROM fields WHERE database_id = ?1 ORDER BY id"),
                    [&id],
                    row_to_field,
                )?,
                relationships: query_all(
                    &self.conn,
                    &format!("SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE database_id = ?1 ORDER BY id"),
                    [&id],
                    row_to_relationship,
                )?,
                scripts: query_all(
                    &self.conn,
                    &format!("SELECT {SCRIPT_COLUMNS} FROM scripts s WHERE s.database_id = ?1 ORDER BY s.id"),
                    [&id],
                    row_to_script,
                )?,
                script_dependencies: query_all(
                    &self.conn,
                    &format!(
                        "SELECT {DEPENDENCY_COLUMNS} FROM script_dependencies WHERE source_database_id = ?1 ORDER BY id"
                    ),
                    [&id],
                    row_to_dependency,
                )?,
                database,
            });
        }

        Ok(Export { databases: exported })
    }

    // ========== Statistics ==========

    fn count(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn grouped(&self, sql: &str) -> Result<Vec<(String, usize)>> {
        query_all(&self.conn, sql, [], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                row.get::<_, i64>(1)? as usize,
            ))
        })
    }

    /// Get store statistics
    pub fn statistics(&self) -> Result<Statistics> {
        Ok(Statistics {
            databases: self.count("databases")?,
            tables: self.count("tables")?,
            fields: self.count("fields")?,
            relationships: self.count("relationships")?,
            scripts: self.count("scripts")?,
            script_dependencies: self.count("script_dependencies")?,
            scripts_by_type: self.grouped(
                "SELECT code_type, COUNT(*) AS n FROM scripts GROUP BY code_type ORDER BY n DESC, code_type",
            )?,
            relationships_by_type: self.grouped(
                "SELECT relationship_type, COUNT(*) AS n FROM relationships
                 GROUP BY relationship_type ORDER BY n DESC, relationship_type",
            )?,
            top_tables: self.grouped(&format!(
                "SELECT table_name, COUNT(*) AS n FROM scripts WHERE table_name IS NOT NULL
                 GROUP BY table_name ORDER BY n DESC, table_name LIMIT {TOP_TABLES}"
            ))?,
            scripts_by_database: self.grouped(
                "SELECT database_name, COUNT(*) AS n FROM scripts GROUP BY database_name ORDER BY n DESC, database_name",
            )?,
        })
    }
}

/// A running refresh. See [`SqliteStore::begin_refresh`].
pub struct RefreshTx<'a> {
    tx: Transaction<'a>,
}

impl RefreshTx<'_> {
    /// Write one database inside its own savepoint.
    ///
    /// On error the savepoint is rolled back, leaving rows of previously written
    /// databases untouched.
    pub fn write_database(&mut self, ingested: &IngestedDatabase, links: &Links) -> Result<WriteStats> {
        let savepoint = self.tx.savepoint()?;
        let stats = write_database(&savepoint, ingested, links)?;
        savepoint.commit()?;
        Ok(stats)
    }

    /// Make the refresh visible
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

fn write_database(conn: &Connection, ingested: &IngestedDatabase, links: &Links) -> Result<WriteStats> {
    let database = &ingested.database;
    conn.execute(
        "INSERT INTO databases (id, name, version, color, icon) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![database.id, database.name, database.version, database.color, database.icon],
    )?;

    {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO tables (database_id, table_id, name, caption, icon, hidden, field_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for table in &ingested.tables {
            stmt.execute(params![
                table.database_id,
                table.table_id,
                table.name,
                table.caption,
                table.icon,
                table.hidden,
                table.field_count as i64,
            ])?;
        }
    }

    {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO fields (database_id, table_id, field_id, name, base_type, is_required,
                                 ref_table_id, ref_table_name, ref_database_id, ref_database_name,
                                 is_composition, has_formula)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        for field in &ingested.fields {
            stmt.execute(params![
                field.database_id,
                field.table_id,
                field.field_id,
                field.name,
                field.base_type,
                field.is_required,
                field.ref_table_id,
                field.ref_table_name,
                field.ref_database_id,
                field.ref_database_name,
                field.is_composition,
                field.has_formula,
            ])?;
        }
    }

    let mut script_ids = Vec::with_capacity(ingested.scripts.len());
    for script in &ingested.scripts {
        script_ids.push(insert_script(conn, script)?);
    }

    let mut relationships = 0;
    for relationship in links.relationships.iter() {
        if insert_relationship(conn, relationship)? {
            relationships += 1;
        }
    }

    let mut dependencies = 0;
    for (index, dependency) in &links.dependencies {
        let Some(script_id) = script_ids.get(*index) else {
            continue;
        };
        insert_dependency(conn, *script_id, dependency)?;
        dependencies += 1;
    }

    Ok(WriteStats {
        tables: ingested.tables.len(),
        fields: ingested.fields.len(),
        scripts: script_ids.len(),
        relationships,
        dependencies,
    })
}

/// Insert a script; the search mirror is maintained by trigger. Returns the row ID.
fn insert_script(conn: &Connection, script: &Script) -> Result<i64> {
    conn.prepare_cached(
        "INSERT INTO scripts (team_id, team_name, database_id, database_name, table_id, table_name,
                              element_id, element_name, code_type, code_category, code, line_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?
    .execute(params![
        script.team_id,
        script.team_name,
        script.database_id,
        script.database_name,
        script.table_id,
        script.table_name,
        script.element_id,
        script.element_name,
        script.code_type,
        script.code_category.as_str(),
        script.code(),
        script.line_count() as i64,
    ])?;
    Ok(conn.last_insert_rowid())
}

/// Insert a relationship unless one with the same identity exists. Returns whether a row was added.
fn insert_relationship(conn: &Connection, relationship: &Relationship) -> Result<bool> {
    let changed = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO relationships (database_id, database_name, source_table_id,
                source_table_name, source_field_id, source_field_name, target_table_id,
                target_table_name, target_database_id, target_database_name, relationship_type,
                is_composition, found_in_code_type, found_in_code)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )?
        .execute(params![
            relationship.database_id,
            relationship.database_name,
            relationship.source_table_id,
            relationship.source_table_name,
            relationship.source_field_id,
            relationship.source_field_name,
            relationship.target_table_id,
            relationship.target_table_name,
            relationship.target_database_id,
            relationship.target_database_name,
            relationship.kind.as_str(),
            relationship.is_composition,
            relationship.found_in_code_type,
            relationship.found_in_code,
        ])?;
    Ok(changed > 0)
}

fn insert_dependency(conn: &Connection, script_id: i64, dependency: &ScriptDependency) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO script_dependencies (script_id, source_database_id, source_database_name,
                                          target_database_name, reference_type, code_snippet)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?
    .execute(params![
        script_id,
        dependency.source_database_id,
        dependency.source_database_name,
        dependency.target_database_name,
        dependency.reference_type.as_str(),
        dependency.code_snippet,
    ])?;
    Ok(())
}

/// `PRAGMA integrity_check` plus the FTS5 check of the script mirror against its content table.
fn check_consistency(conn: &Connection) -> Result<()> {
    let verdict: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    if verdict != "ok" {
        return Err(Error::CorruptStore(verdict));
    }

    let has_index: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'scripts_fts')",
        [],
        |row| row.get(0),
    )?;
    if has_index {
        conn.execute(
            "INSERT INTO scripts_fts(scripts_fts, rank) VALUES('integrity-check', 1)",
            [],
        )
        .map_err(|e| Error::CorruptStore(format!("search index: {e}")))?;
    }
    Ok(())
}

fn remove_store_files(path: &Path) -> Result<()> {
    std::fs::remove_file(path)?;
    for suffix in STORE_SIDE_FILES {
        let mut side: OsString = path.as_os_str().to_owned();
        side.push(suffix);
        let side = PathBuf::from(side);
        if side.exists() {
            std::fs::remove_file(&side)?;
        }
    }
    Ok(())
}

/// Escape `\`, `%` and `_` for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn query_all<T, P, F>(conn: &Connection, sql: &str, params: P, map: F) -> Result<Vec<T>>
where
    P: rusqlite::Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Parse a text column through `FromStr`
fn parse_column<T: FromStr<Err = Error>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_database(row: &Row<'_>) -> rusqlite::Result<Database> {
    Ok(Database {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        color: row.get(3)?,
        icon: row.get(4)?,
    })
}

fn row_to_table(row: &Row<'_>) -> rusqlite::Result<Table> {
    Ok(Table {
        database_id: row.get(0)?,
        table_id: row.get(1)?,
        name: row.get(2)?,
        caption: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        icon: row.get(4)?,
        hidden: row.get(5)?,
        field_count: row.get::<_, i64>(6)? as usize,
    })
}

fn row_to_field(row: &Row<'_>) -> rusqlite::Result<Field> {
    Ok(Field {
        database_id: row.get(0)?,
        table_id: row.get(1)?,
        field_id: row.get(2)?,
        name: row.get(3)?,
        base_type: row.get(4)?,
        is_required: row.get(5)?,
        ref_table_id: row.get(6)?,
        ref_table_name: row.get(7)?,
        ref_database_id: row.get(8)?,
        ref_database_name: row.get(9)?,
        is_composition: row.get(10)?,
        has_formula: row.get(11)?,
    })
}

fn row_to_script(row: &Row<'_>) -> rusqlite::Result<Script> {
    let team = TeamInfo {
        id: row.get(1)?,
        name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
    };
    let mut script = Script::new(
        &team,
        row.get::<_, String>(3)?,
        row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        row.get::<_, String>(9)?,
        parse_column(row, 10)?,
        row.get::<_, String>(11)?,
    );
    script.id = row.get(0)?;
    script.table_id = row.get(5)?;
    script.table_name = row.get(6)?;
    script.element_id = row.get(7)?;
    script.element_name = row.get(8)?;
    Ok(script)
}

fn row_to_relationship(row: &Row<'_>) -> rusqlite::Result<Relationship> {
    Ok(Relationship {
        database_id: row.get(0)?,
        database_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        source_table_id: row.get(2)?,
        source_table_name: row.get(3)?,
        source_field_id: row.get(4)?,
        source_field_name: row.get(5)?,
        target_table_id: row.get(6)?,
        target_table_name: row.get(7)?,
        target_database_id: row.get(8)?,
        target_database_name: row.get(9)?,
        kind: parse_column(row, 10)?,
        is_composition: row.get(11)?,
        found_in_code_type: row.get(12)?,
        found_in_code: row.get(13)?,
    })
}

fn row_to_dependency(row: &Row<'_>) -> rusqlite::Result<ScriptDependency> {
    Ok(ScriptDependency {
        script_id: row.get(0)?,
        source_database_id: row.get(1)?,
        source_database_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        target_database_name: row.get(3)?,
        reference_type: parse_column(row, 4)?,
        code_snippet: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

/// Restricts a script search. `database` matches the database ID or name.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub database: Option<String>,
    pub table: Option<String>,
    pub code_type: Option<String>,
}

impl SearchFilter {
    fn apply(&self, sql: &mut String, values: &mut Vec<Value>) {
        if let Some(database) = &self.database {
            sql.push_str(" AND (s.database_id = ? OR s.database_name = ?)");
            values.push(Value::Text(database.clone()));
            values.push(Value::Text(database.clone()));
        }
        if let Some(table) = &self.table {
            sql.push_str(" AND s.table_name = ?");
            values.push(Value::Text(table.clone()));
        }
        if let Some(code_type) = &self.code_type {
            sql.push_str(" AND s.code_type = ?");
            values.push(Value::Text(code_type.clone()));
        }
    }
}

/// One search result
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub script: Script,
    /// FTS5 rank (lower is better); `None` for substring matches
    pub rank: Option<f64>,
    /// Code with matched terms wrapped in [`MATCH_OPEN`] / [`MATCH_CLOSE`]
    pub highlighted: Option<String>,
}

/// Restricts a relationship listing
#[derive(Debug, Clone, Default)]
pub struct RelationshipFilter {
    /// Database ID or name
    pub database: Option<String>,
    /// Table on either end
    pub table: Option<String>,
    pub kind: Option<RelationshipKind>,
    pub exclude_formula_refs: bool,
}

/// Relationships of one table, split by direction and kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableDependencies {
    pub references: Vec<Relationship>,
    pub referenced_by: Vec<Relationship>,
    pub formula_references: Vec<Relationship>,
}

/// Rows written for one database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub tables: usize,
    pub fields: usize,
    pub scripts: usize,
    pub relationships: usize,
    pub dependencies: usize,
}

/// Everything stored about one database
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseExport {
    #[serde(flatten)]
    pub database: Database,
    pub tables: Vec<Table>,
    pub fields: Vec<Field>,
    pub relationships: Vec<Relationship>,
    pub scripts: Vec<Script>,
    pub script_dependencies: Vec<ScriptDependency>,
}

/// Bulk export of the store
#[derive(Debug, Clone, Serialize)]
pub struct Export {
    pub databases: Vec<DatabaseExport>,
}

/// Store statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub databases: usize,
    pub tables: usize,
    pub fields: usize,
    pub relationships: usize,
    pub scripts: usize,
    pub script_dependencies: usize,
    pub scripts_by_type: Vec<(String, usize)>,
    pub relationships_by_type: Vec<(String, usize)>,
    pub top_tables: Vec<(String, usize)>,
    pub scripts_by_database: Vec<(String, usize)>,
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Store Statistics:")?;
        writeln!(f, "  Databases: {}", self.databases)?;
        writeln!(f, "  Tables: {}", self.tables)?;
        writeln!(f, "  Fields: {}", self.fields)?;
        writeln!(f, "  Relationships: {}", self.relationships)?;
        writeln!(f, "  Scripts: {}", self.scripts)?;
        write!(f, "  Script dependencies: {}", self.script_dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest, parse_document};
    use crate::linker::{LinkOptions, link};
    use serde_json::json;

    fn sample(database_id: &str, name: &str) -> (IngestedDatabase, Links) {
        let doc = parse_document(
            database_id,
            json!({
                "settings": {"name": name},
                "schema": {
                    "version": 3,
                    "globalCode": "function audit() do\n  do as database 'Sales' create Invoice end\nend",
                    "types": {
                        "A": {
                            "caption": "Customers",
                            "fields": {
                                "A1": {"caption": "Name", "base": "string"},
                                "A2": {"caption": "Orders", "base": "number", "fn": "cnt(select Orders where Customer = this)"}
                            }
                        },
                        "B": {
                            "caption": "Orders",
                            "afterCreate": "let c := select Customers;\nalert(\"created\")",
                            "fields": {
                                "B1": {"caption": "Customer", "base": "ref", "refTypeId": "A"}
                            }
                        }
                    }
                }
            }),
        )
        .unwrap();
        let ingested = ingest(&TeamInfo::new("t1", Some("Acme".into())), database_id, None, &doc);
        let links = link(&ingested, &LinkOptions::default());
        (ingested, links)
    }

    fn populated() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let (ingested, links) = sample("db1", "CRM");
        let mut refresh = store.begin_refresh().unwrap();
        refresh.write_database(&ingested, &links).unwrap();
        refresh.commit().unwrap();
        store
    }

    fn fts_matches(store: &SqliteStore, query: &str) -> i64 {
        store
            .conn
            .query_row("SELECT COUNT(*) FROM scripts_fts WHERE scripts_fts MATCH ?1", [query], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_empty_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        let stats = store.statistics().unwrap();
        assert_eq!(stats.scripts, 0);
        assert!(stats.top_tables.is_empty());
        store.verify_search_index().unwrap();
    }

    #[test]
    fn test_write_and_list() {
        let store = populated();

        let databases = store.list_databases().unwrap();
        assert_eq!(databases.len(), 1);
        assert_eq!(databases[0].database.name, "CRM");
        assert_eq!(databases[0].database.version, Some(3));
        assert_eq!(databases[0].table_count, 2);
        assert_eq!(databases[0].script_count, 3);

        let tables = store.list_tables(Some("db1")).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Customers", "Orders"]);
        assert!(store.list_tables(Some("other")).unwrap().is_empty());
    }

    #[test]
    fn test_script_roundtrip() {
        let store = populated();
        let hits = store.search("audit", &SearchFilter::default(), 10).unwrap();
        let stored = store.script(hits[0].script.id).unwrap().unwrap();

        assert_eq!(stored.code_type, "globalCode");
        assert_eq!(stored.team_name, "Acme");
        assert_eq!(stored.table_name, None);
        assert_eq!(stored.line_count(), 3);
        assert!(stored.code().contains("do as database"));
        assert!(store.script(9999).unwrap().is_none());
    }

    #[test]
    fn test_relationship_dedup_in_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute("INSERT INTO databases (id, name) VALUES ('db', 'CRM')", [])
            .unwrap();

        let rel = Relationship::new("db", "CRM", "B", "Orders", "Customers", RelationshipKind::FormulaRef);
        assert!(insert_relationship(&store.conn, &rel).unwrap());
        assert!(!insert_relationship(&store.conn, &rel.clone().with_code("fn", "other")).unwrap());

        let with_field = rel.clone().with_source_field(None, Some("Total".into()));
        assert!(insert_relationship(&store.conn, &with_field).unwrap());
        assert!(!insert_relationship(&store.conn, &with_field).unwrap());

        assert_eq!(store.statistics().unwrap().relationships, 2);
    }

    #[test]
    fn test_search_index_follows_scripts() {
        let store = populated();
        assert_eq!(fts_matches(&store, "audit"), 1);

        store
            .conn
            .execute("DELETE FROM script_dependencies", [])
            .unwrap();
        store
            .conn
            .execute("DELETE FROM scripts WHERE code_type = 'globalCode'", [])
            .unwrap();

        assert_eq!(fts_matches(&store, "audit"), 0);
        store.verify_search_index().unwrap();
    }

    #[test]
    fn test_search_ranked_and_filtered() {
        let store = populated();

        let hits = store.search("audit", &SearchFilter::default(), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].rank.is_some());
        assert!(hits[0].highlighted.as_deref().unwrap().contains(">>>audit<<<"));

        let filter = SearchFilter {
            table: Some("Orders".into()),
            ..SearchFilter::default()
        };
        let hits = store.search("Customers", &filter, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].script.code_type, "afterCreate");

        let by_name = SearchFilter {
            database: Some("CRM".into()),
            ..SearchFilter::default()
        };
        assert_eq!(store.search("audit", &by_name, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_query_falls_back() {
        let store = populated();

        let hits = store.search("audit(", &SearchFilter::default(), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rank, None);
        assert_eq!(hits[0].highlighted, None);

        assert!(store.search("\"unterminated", &SearchFilter::default(), 10).unwrap().is_empty());

        let elsewhere = SearchFilter {
            database: Some("nope".into()),
            ..SearchFilter::default()
        };
        assert!(store.search("audit(", &elsewhere, 10).unwrap().is_empty());
    }

    #[test]
    fn test_like_fallback_is_literal() {
        let store = populated();
        // `%` and `_` are not wildcards in the substring scan
        assert!(store.search_like("a_d%t", &SearchFilter::default(), 10).unwrap().is_empty());
        assert_eq!(escape_like(r"50%_\"), r"50\%\_\\");
    }

    #[test]
    fn test_dependencies_are_disjoint() {
        let store = populated();

        let orders = store.dependencies("Orders").unwrap();
        assert_eq!(orders.references.len(), 1);
        assert_eq!(orders.references[0].kind, RelationshipKind::ManyToOne);
        assert!(orders.referenced_by.is_empty());
        assert_eq!(orders.formula_references.len(), 2);

        let customers = store.dependencies("Customers").unwrap();
        assert!(customers.references.is_empty());
        assert_eq!(customers.referenced_by.len(), 1);
        assert_eq!(customers.formula_references.len(), 2);

        for deps in [&orders, &customers] {
            assert!(deps
                .references
                .iter()
                .chain(&deps.referenced_by)
                .all(|r| r.kind != RelationshipKind::FormulaRef));
            assert!(deps.formula_references.iter().all(|r| r.kind == RelationshipKind::FormulaRef));
        }
    }

    #[test]
    fn test_relationship_filter() {
        let store = populated();
        assert_eq!(store.relationships(&RelationshipFilter::default()).unwrap().len(), 3);

        let structural = RelationshipFilter {
            exclude_formula_refs: true,
            ..RelationshipFilter::default()
        };
        assert_eq!(store.relationships(&structural).unwrap().len(), 1);

        let formula = RelationshipFilter {
            database: Some("db1".into()),
            kind: Some(RelationshipKind::FormulaRef),
            table: Some("Customers".into()),
            ..RelationshipFilter::default()
        };
        assert_eq!(store.relationships(&formula).unwrap().len(), 2);
    }

    #[test]
    fn test_statistics() {
        let store = populated();
        let stats = store.statistics().unwrap();
        assert_eq!(stats.databases, 1);
        assert_eq!(stats.tables, 2);
        assert_eq!(stats.fields, 3);
        assert_eq!(stats.relationships, 3);
        assert_eq!(stats.scripts, 3);
        assert_eq!(stats.script_dependencies, 1);
        assert_eq!(stats.scripts_by_type.len(), 3);
        assert_eq!(
            stats.relationships_by_type,
            vec![("FORMULA_REF".to_string(), 2), ("N:1".to_string(), 1)]
        );
        assert_eq!(
            stats.top_tables,
            vec![("Customers".to_string(), 1), ("Orders".to_string(), 1)]
        );
        assert_eq!(stats.scripts_by_database, vec![("CRM".to_string(), 3)]);
        assert!(stats.to_string().contains("Scripts: 3"));
    }

    #[test]
    fn test_script_dependencies() {
        let store = populated();
        let deps = store.script_dependencies(Some("CRM")).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].target_database_name, "Sales");
        assert!(deps[0].script_id > 0);
        assert!(store.script_dependencies(Some("other")).unwrap().is_empty());
        assert_eq!(store.script_dependencies(None).unwrap().len(), 1);
    }

    #[test]
    fn test_refresh_replaces_previous_run() {
        let mut store = populated();
        let (ingested, links) = sample("db1", "CRM");
        let mut refresh = store.begin_refresh().unwrap();
        refresh.write_database(&ingested, &links).unwrap();
        refresh.commit().unwrap();

        let stats = store.statistics().unwrap();
        assert_eq!(stats.scripts, 3);
        assert_eq!(stats.relationships, 3);
        assert_eq!(fts_matches(&store, "audit"), 1);
        store.verify_search_index().unwrap();
    }

    #[test]
    fn test_uncommitted_refresh_rolls_back() {
        let mut store = populated();
        {
            let _refresh = store.begin_refresh().unwrap();
        }
        assert_eq!(store.statistics().unwrap().scripts, 3);
    }

    #[test]
    fn test_failed_database_rolls_back_savepoint() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let (good, good_links) = sample("db1", "CRM");
        let (mut bad, bad_links) = sample("db2", "Broken");
        let duplicate = bad.tables[0].clone();
        bad.tables.push(duplicate);

        let mut refresh = store.begin_refresh().unwrap();
        assert!(refresh.write_database(&bad, &bad_links).is_err());
        refresh.write_database(&good, &good_links).unwrap();
        refresh.commit().unwrap();

        let databases = store.list_databases().unwrap();
        assert_eq!(databases.len(), 1);
        assert_eq!(databases[0].database.id, "db1");
        assert_eq!(store.statistics().unwrap().scripts, 3);
    }

    #[test]
    fn test_rolled_back_scripts_leave_search_index() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let (good, good_links) = sample("db1", "CRM");
        let (bad, mut bad_links) = sample("db2", "Broken");
        bad_links.dependencies[0].1.source_database_id = "missing".into();

        let mut refresh = store.begin_refresh().unwrap();
        refresh.write_database(&good, &good_links).unwrap();
        assert!(refresh.write_database(&bad, &bad_links).is_err());
        refresh.commit().unwrap();

        store.verify_search_index().unwrap();
        let scripts: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM scripts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(scripts, 3);
        assert_eq!(fts_matches(&store, "CRM"), scripts);
        assert_eq!(fts_matches(&store, "Broken"), 0);
        assert_eq!(store.search("Invoice", &SearchFilter::default(), 10).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_missing_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = remove_store_files(&dir.path().join("missing.db"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_export() {
        let store = populated();
        let export = store.export(None).unwrap();
        assert_eq!(export.databases.len(), 1);

        let db = &export.databases[0];
        assert_eq!(db.tables.len(), 2);
        assert_eq!(db.fields.len(), 3);
        assert_eq!(db.relationships.len(), 3);
        assert_eq!(db.scripts.len(), 3);
        assert_eq!(db.script_dependencies.len(), 1);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["databases"][0]["name"], "CRM");
        assert_eq!(json["databases"][0]["relationships"][0]["relationship_type"], "N:1");

        assert!(store.export(Some("missing")).unwrap().databases.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        std::fs::write(&path, vec![0xAB; 4096]).unwrap();
        let journal = dir.path().join("store.db-journal");
        std::fs::write(&journal, b"stale").unwrap();

        let store = SqliteStore::open_for_refresh(&path).unwrap();
        assert!(!journal.exists());
        assert_eq!(store.statistics().unwrap().scripts, 0);
        store.verify_search_index().unwrap();
    }

    #[test]
    fn test_healthy_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            let (ingested, links) = sample("db1", "CRM");
            let mut refresh = store.begin_refresh().unwrap();
            refresh.write_database(&ingested, &links).unwrap();
            refresh.commit().unwrap();
        }

        let store = SqliteStore::open_for_refresh(&path).unwrap();
        assert_eq!(store.statistics().unwrap().scripts, 3);
    }
}
