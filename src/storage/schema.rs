//! Database schema definitions

/// SQL to create the databases table
pub const CREATE_DATABASES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS databases (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    version INTEGER,
    color TEXT,
    icon TEXT,
    extracted_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

/// SQL to create the tables table
pub const CREATE_TABLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    database_id TEXT NOT NULL,
    table_id TEXT NOT NULL,
    name TEXT NOT NULL,
    caption TEXT,
    icon TEXT,
    hidden INTEGER NOT NULL DEFAULT 0,
    field_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(database_id, table_id),
    FOREIGN KEY (database_id) REFERENCES databases(id)
)
"#;

/// SQL to create the fields table
pub const CREATE_FIELDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS fields (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    database_id TEXT NOT NULL,
    table_id TEXT NOT NULL,
    field_id TEXT NOT NULL,
    name TEXT NOT NULL,
    base_type TEXT NOT NULL DEFAULT '',
    is_required INTEGER NOT NULL DEFAULT 0,
    ref_table_id TEXT,
    ref_table_name TEXT,
    ref_database_id TEXT,
    ref_database_name TEXT,
    is_composition INTEGER NOT NULL DEFAULT 0,
    has_formula INTEGER NOT NULL DEFAULT 0,
    UNIQUE(database_id, table_id, field_id),
    FOREIGN KEY (database_id) REFERENCES databases(id)
)
"#;

/// SQL to create the relationships table
pub const CREATE_RELATIONSHIPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS relationships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    database_id TEXT NOT NULL,
    database_name TEXT,
    source_table_id TEXT NOT NULL,
    source_table_name TEXT NOT NULL,
    source_field_id TEXT,
    source_field_name TEXT,
    target_table_id TEXT,
    target_table_name TEXT NOT NULL,
    target_database_id TEXT,
    target_database_name TEXT,
    relationship_type TEXT NOT NULL,
    is_composition INTEGER NOT NULL DEFAULT 0,
    found_in_code_type TEXT,
    found_in_code TEXT,
    FOREIGN KEY (database_id) REFERENCES databases(id)
)
"#;

/// SQL to create the scripts table
pub const CREATE_SCRIPTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS scripts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id TEXT NOT NULL,
    team_name TEXT,
    database_id TEXT NOT NULL,
    database_name TEXT,
    table_id TEXT,
    table_name TEXT,
    element_id TEXT,
    element_name TEXT,
    code_type TEXT NOT NULL,
    code_category TEXT NOT NULL,
    code TEXT NOT NULL,
    line_count INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (database_id) REFERENCES databases(id)
)
"#;

/// SQL to create the script_dependencies table
pub const CREATE_SCRIPT_DEPENDENCIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS script_dependencies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    script_id INTEGER NOT NULL,
    source_database_id TEXT NOT NULL,
    source_database_name TEXT,
    target_database_name TEXT NOT NULL,
    reference_type TEXT NOT NULL,
    code_snippet TEXT,
    FOREIGN KEY (script_id) REFERENCES scripts(id) ON DELETE CASCADE,
    FOREIGN KEY (source_database_id) REFERENCES databases(id)
)
"#;

/// Full-text mirror of `scripts`, keyed by the script row ID
pub const CREATE_SCRIPTS_FTS: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS scripts_fts USING fts5(
    code,
    team_name,
    database_name,
    table_name,
    element_name,
    code_type,
    content='scripts',
    content_rowid='id'
)
"#;

/// Mirror every inserted script
pub const CREATE_SCRIPTS_INSERT_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS scripts_ai AFTER INSERT ON scripts BEGIN
    INSERT INTO scripts_fts(rowid, code, team_name, database_name, table_name, element_name, code_type)
    VALUES (new.id, new.code, new.team_name, new.database_name, new.table_name, new.element_name, new.code_type);
END
"#;

/// Remove the mirror row of every deleted script
pub const CREATE_SCRIPTS_DELETE_TRIGGER: &str = r#"
CREATE TRIGGER IF NOT EXISTS scripts_ad AFTER DELETE ON scripts BEGIN
    INSERT INTO scripts_fts(scripts_fts, rowid, code, team_name, database_name, table_name, element_name, code_type)
    VALUES ('delete', old.id, old.code, old.team_name, old.database_name, old.table_name, old.element_name, old.code_type);
END
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_scripts_team ON scripts(team_id)",
    "CREATE INDEX IF NOT EXISTS idx_scripts_db ON scripts(database_id)",
    "CREATE INDEX IF NOT EXISTS idx_scripts_table ON scripts(table_name)",
    "CREATE INDEX IF NOT EXISTS idx_scripts_type ON scripts(code_type)",
    "CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_table_name)",
    "CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_table_name)",
    "CREATE INDEX IF NOT EXISTS idx_fields_ref ON fields(ref_table_name)",
    "CREATE INDEX IF NOT EXISTS idx_dependencies_script ON script_dependencies(script_id)",
    "CREATE INDEX IF NOT EXISTS idx_dependencies_source ON script_dependencies(source_database_name)",
    "CREATE INDEX IF NOT EXISTS idx_dependencies_target ON script_dependencies(target_database_name)",
    // one row per relationship identity
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_relationships_identity ON relationships(
        database_id, source_table_name, COALESCE(source_field_name, ''), target_table_name, relationship_type
    )"#,
];

/// Tables in the order their rows must be deleted
pub const CLEAR_ORDER: &[&str] = &[
    "script_dependencies",
    "scripts",
    "relationships",
    "fields",
    "tables",
    "databases",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_DATABASES_TABLE,
        CREATE_TABLES_TABLE,
        CREATE_FIELDS_TABLE,
        CREATE_RELATIONSHIPS_TABLE,
        CREATE_SCRIPTS_TABLE,
        CREATE_SCRIPT_DEPENDENCIES_TABLE,
        CREATE_SCRIPTS_FTS,
        CREATE_SCRIPTS_INSERT_TRIGGER,
        CREATE_SCRIPTS_DELETE_TRIGGER,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
