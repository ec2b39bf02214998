//! Entity records - databases, tables and fields as persisted

use serde::{Deserialize, Serialize};

/// One extracted Ninox database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub id: String,
    pub name: String,
    pub version: Option<i64>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// A table, unique per `(database_id, table_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub database_id: String,
    pub table_id: String,
    pub name: String,
    pub caption: String,
    pub icon: Option<String>,
    pub hidden: bool,
    pub field_count: usize,
}

/// A field, unique per `(database_id, table_id, field_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub database_id: String,
    pub table_id: String,
    pub field_id: String,
    pub name: String,
    pub base_type: String,
    pub is_required: bool,
    /// Raw target table identifier of a reference field
    pub ref_table_id: Option<String>,
    /// Target table caption, or the raw identifier when it could not be resolved
    pub ref_table_name: Option<String>,
    /// Target database of a cross-database reference
    pub ref_database_id: Option<String>,
    pub ref_database_name: Option<String>,
    pub is_composition: bool,
    pub has_formula: bool,
}

impl Field {
    /// A `ref` field pointing at some table implies a structural relationship.
    pub fn is_reference(&self) -> bool {
        self.base_type == "ref" && self.ref_table_name.is_some()
    }

    pub fn is_cross_database(&self) -> bool {
        self.ref_database_id.is_some()
    }
}

/// Database row plus derived counts, as returned by listings.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSummary {
    #[serde(flatten)]
    pub database: Database,
    pub table_count: usize,
    pub script_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(base: &str, target: Option<&str>) -> Field {
        Field {
            database_id: "db".into(),
            table_id: "A".into(),
            field_id: "B".into(),
            name: "Customer".into(),
            base_type: base.into(),
            is_required: false,
            ref_table_id: target.map(Into::into),
            ref_table_name: target.map(Into::into),
            ref_database_id: None,
            ref_database_name: None,
            is_composition: false,
            has_formula: false,
        }
    }

    #[test]
    fn test_reference_requires_target() {
        assert!(field("ref", Some("C")).is_reference());
        assert!(!field("ref", None).is_reference());
        assert!(!field("string", Some("C")).is_reference());
    }
}
