//! Schema ingestion - turns a database document into entity records and scripts
//!
//! Two passes over the document: the first builds the table identity maps used to
//! resolve reference targets, the second emits tables, fields and every non-blank
//! script attribute at database, table and field level.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::model::{Database, Field, Table};
use crate::schema::{DatabaseDocument, SchemaBody};
use crate::script::{
    CodeCategory, DATABASE_CODE_FIELDS, FIELD_CODE_FIELDS, MIN_FORMULA_LEN, Script, TABLE_CODE_FIELDS,
    TeamInfo,
};
use crate::{Error, Result};

/// Table identity maps of one database: type ID → name and UUID → name.
#[derive(Debug, Clone, Default)]
pub struct TableIndex {
    by_id: HashMap<String, String>,
    by_uuid: HashMap<String, String>,
    names: HashSet<String>,
}

impl TableIndex {
    pub fn build(schema: &SchemaBody) -> Self {
        let mut index = TableIndex::default();
        for (type_id, type_def) in &schema.types {
            let name = type_def.caption_or(type_id).to_string();
            if let Some(uuid) = type_def.uuid.as_deref().filter(|u| !u.is_empty()) {
                index.by_uuid.insert(uuid.to_string(), name.clone());
            }
            index.names.insert(name.clone());
            index.by_id.insert(type_id.clone(), name);
        }
        index
    }

    /// Display name of a table by type ID
    pub fn name(&self, type_id: &str) -> Option<&str> {
        self.by_id.get(type_id).map(String::as_str)
    }

    pub fn name_by_uuid(&self, uuid: &str) -> Option<&str> {
        self.by_uuid.get(uuid).map(String::as_str)
    }

    /// Target table name of a reference.
    ///
    /// `ref_type_id` wins over `ref_type_uuid`. An identifier that cannot be resolved
    /// is returned as is; `None` only if both are absent.
    pub fn resolve(&self, ref_type_id: Option<&str>, ref_type_uuid: Option<&str>) -> Option<String> {
        let present = |s: &&str| !s.is_empty();
        if let Some(id) = ref_type_id.filter(present) {
            return Some(self.name(id).unwrap_or(id).to_string());
        }
        ref_type_uuid
            .filter(present)
            .map(|uuid| self.name_by_uuid(uuid).unwrap_or(uuid).to_string())
    }

    /// Is `name` the display name of a table in this database?
    pub fn is_table_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Everything ingested from one database document.
#[derive(Debug, Clone)]
pub struct IngestedDatabase {
    pub database: Database,
    pub tables: Vec<Table>,
    pub fields: Vec<Field>,
    pub scripts: Vec<Script>,
    pub index: TableIndex,
}

/// Parse a raw schema document, tagging failures with the database they belong to.
pub fn parse_document(database_id: &str, raw: Value) -> Result<DatabaseDocument> {
    serde_json::from_value(raw).map_err(|source| Error::MalformedSchema {
        database: database_id.to_string(),
        source,
    })
}

/// Ingest one database document.
///
/// `listing_name` is the name reported by the database listing; it is used when the
/// document carries no `settings.name`.
pub fn ingest(
    team: &TeamInfo,
    database_id: &str,
    listing_name: Option<&str>,
    document: &DatabaseDocument,
) -> IngestedDatabase {
    let schema = &document.schema;
    let index = TableIndex::build(schema);

    let database_name = document
        .settings
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .or(listing_name.filter(|n| !n.is_empty()))
        .unwrap_or(database_id)
        .to_string();

    let database = Database {
        id: database_id.to_string(),
        name: database_name.clone(),
        version: schema.version,
        color: document.settings.color.clone(),
        icon: document.settings.icon.clone(),
    };

    let script = |code_type: &str, category: CodeCategory, code: &str| {
        Script::new(team, database_id, &database_name, code_type, category, code)
    };

    let mut tables = Vec::with_capacity(schema.types.len());
    let mut fields = Vec::new();
    let mut scripts = Vec::new();

    for (code_type, category) in DATABASE_CODE_FIELDS {
        if let Some(code) = schema.code(code_type) {
            scripts.push(script(*code_type, *category, code));
        }
    }

    for (type_id, type_def) in &schema.types {
        let table_name = type_def.caption_or(type_id);

        tables.push(Table {
            database_id: database_id.to_string(),
            table_id: type_id.clone(),
            name: table_name.to_string(),
            caption: table_name.to_string(),
            icon: type_def.icon.clone(),
            hidden: type_def.hidden,
            field_count: type_def.fields.len(),
        });

        for (code_type, category) in TABLE_CODE_FIELDS {
            if let Some(code) = type_def.code(code_type) {
                scripts.push(script(*code_type, *category, code).in_table(type_id, table_name));
            }
        }

        for (field_id, field_def) in &type_def.fields {
            let field_name = field_def.caption_or(field_id);

            fields.push(Field {
                database_id: database_id.to_string(),
                table_id: type_id.clone(),
                field_id: field_id.clone(),
                name: field_name.to_string(),
                base_type: field_def.base_type().to_string(),
                is_required: field_def.required,
                ref_table_id: field_def.ref_type_id.clone().filter(|id| !id.is_empty()),
                ref_table_name: index.resolve(
                    field_def.ref_type_id.as_deref(),
                    field_def.ref_type_uuid.as_deref(),
                ),
                ref_database_id: field_def.db_id.clone().filter(|id| !id.is_empty()),
                ref_database_name: field_def.db_name.clone(),
                is_composition: field_def.composition,
                has_formula: field_def.has_formula(),
            });

            for (code_type, category) in FIELD_CODE_FIELDS {
                let Some(code) = field_def.code(code_type) else {
                    continue;
                };
                if *code_type == "fn" && code.chars().count() < MIN_FORMULA_LEN {
                    continue;
                }
                scripts.push(
                    script(*code_type, *category, code)
                        .in_table(type_id, table_name)
                        .on_element(field_id, field_name),
                );
            }
        }
    }

    debug!(
        database = %database_name,
        tables = tables.len(),
        fields = fields.len(),
        scripts = scripts.len(),
        "Ingested schema"
    );

    IngestedDatabase {
        database,
        tables,
        fields,
        scripts,
        index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn team() -> TeamInfo {
        TeamInfo::new("t1", Some("Acme".into()))
    }

    fn sample() -> DatabaseDocument {
        parse_document(
            "db1",
            json!({
                "settings": {"name": "CRM", "icon": "star"},
                "schema": {
                    "version": "7",
                    "globalCode": "function greet() do alert(\"hi\") end",
                    "afterOpen": "   ",
                    "types": {
                        "A": {
                            "caption": "Customers",
                            "uuid": "uuid-a",
                            "fields": {
                                "A1": {"caption": "Name", "base": "string", "required": true}
                            }
                        },
                        "B": {
                            "caption": "Orders",
                            "hidden": true,
                            "afterCreate": "let c := first(select Customers); Customer := c",
                            "fields": {
                                "B1": {"caption": "Customer", "base": "ref", "refTypeId": "A"},
                                "B2": {"caption": "Product", "base": "ref", "refTypeUUID": "uuid-a"},
                                "B3": {"caption": "Ghost", "base": "ref", "refTypeId": "Z"},
                                "B4": {"caption": "Total", "base": "number", "fn": "sum(Items.Price)"},
                                "B5": {"base": "number", "fn": "42"},
                                "B6": {"caption": "Remote", "base": "ref", "refTypeId": "X", "dbId": "db2", "dbName": "Stock"}
                            }
                        }
                    }
                }
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_database_record() {
        let ingested = ingest(&team(), "db1", Some("listing"), &sample());
        assert_eq!(ingested.database.name, "CRM");
        assert_eq!(ingested.database.version, Some(7));
        assert_eq!(ingested.database.icon.as_deref(), Some("star"));
    }

    #[test]
    fn test_database_name_fallbacks() {
        let doc = DatabaseDocument::default();
        assert_eq!(ingest(&team(), "db9", Some("Listed"), &doc).database.name, "Listed");
        assert_eq!(ingest(&team(), "db9", None, &doc).database.name, "db9");
    }

    #[test]
    fn test_tables_and_fields() {
        let ingested = ingest(&team(), "db1", None, &sample());
        assert_eq!(ingested.tables.len(), 2);

        let orders = ingested.tables.iter().find(|t| t.table_id == "B").unwrap();
        assert_eq!(orders.name, "Orders");
        assert!(orders.hidden);
        assert_eq!(orders.field_count, 6);

        let field = |id: &str| ingested.fields.iter().find(|f| f.field_id == id).unwrap();
        assert_eq!(field("B1").ref_table_name.as_deref(), Some("Customers"));
        assert_eq!(field("B2").ref_table_name.as_deref(), Some("Customers"));
        assert_eq!(field("B3").ref_table_name.as_deref(), Some("Z"));
        assert!(field("B4").has_formula);
        assert_eq!(field("B5").name, "B5");
        assert!(field("A1").is_required);
        assert_eq!(field("B6").ref_database_id.as_deref(), Some("db2"));
        assert!(field("B6").is_cross_database());
    }

    #[test]
    fn test_scripts_emitted_per_level() {
        let ingested = ingest(&team(), "db1", None, &sample());
        let types: Vec<_> = ingested.scripts.iter().map(|s| s.code_type.as_str()).collect();

        // blank afterOpen and the two-character formula are dropped
        assert_eq!(types, vec!["globalCode", "afterCreate", "fn"]);

        let global = &ingested.scripts[0];
        assert_eq!(global.code_category, CodeCategory::Global);
        assert_eq!(global.table_name, None);
        assert_eq!(global.team_name, "Acme");
        assert_eq!(global.database_name, "CRM");

        let trigger = &ingested.scripts[1];
        assert_eq!(trigger.table_name.as_deref(), Some("Orders"));
        assert_eq!(trigger.element_name, None);

        let formula = &ingested.scripts[2];
        assert_eq!(formula.element_name.as_deref(), Some("Total"));
        assert_eq!(formula.code_category, CodeCategory::Formula);
    }

    #[test]
    fn test_index_resolution() {
        let index = TableIndex::build(&sample().schema);
        assert_eq!(index.len(), 2);
        assert_eq!(index.resolve(Some("A"), Some("ignored")).as_deref(), Some("Customers"));
        assert_eq!(index.resolve(None, Some("uuid-a")).as_deref(), Some("Customers"));
        assert_eq!(index.resolve(Some(""), Some("nope")).as_deref(), Some("nope"));
        assert_eq!(index.resolve(None, None), None);
        assert!(index.is_table_name("Orders"));
        assert!(!index.is_table_name("B"));
    }

    #[test]
    fn test_document_order_kept() {
        let doc = parse_document(
            "db1",
            json!({
                "schema": {
                    "types": {
                        "B": {
                            "caption": "Orders",
                            "afterCreate": "alert(\"order\")",
                            "fields": {
                                "B2": {"caption": "Total", "base": "number"},
                                "B1": {"caption": "Customer", "base": "ref", "refTypeId": "A"}
                            }
                        },
                        "A": {"caption": "Customers", "afterCreate": "alert(\"customer\")"}
                    }
                }
            }),
        )
        .unwrap();
        let ingested = ingest(&team(), "db1", None, &doc);

        let tables: Vec<_> = ingested.tables.iter().map(|t| t.table_id.as_str()).collect();
        assert_eq!(tables, vec!["B", "A"]);
        let fields: Vec<_> = ingested.fields.iter().map(|f| f.field_id.as_str()).collect();
        assert_eq!(fields, vec!["B2", "B1"]);
        let owners: Vec<_> = ingested.scripts.iter().filter_map(|s| s.table_name.as_deref()).collect();
        assert_eq!(owners, vec!["Orders", "Customers"]);
    }

    #[test]
    fn test_malformed_document() {
        let err = parse_document("db1", json!({"schema": {"types": [1, 2]}})).unwrap_err();
        assert!(matches!(err, Error::MalformedSchema { ref database, .. } if database == "db1"));
    }
}
