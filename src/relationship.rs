//! Relationship types - links between tables and databases
//!
//! Structural links come from reference fields:
//! - `N:1`: a reference field pointing at a table of the same database
//! - `CROSS_DB`: a reference field pointing into another database
//!
//! Script-discovered links come from pattern matching over code:
//! - `FORMULA_REF`: a script mentions a table (`select Orders`, `first(Orders ...`)
//!
//! `1:N` and `M:N` exist for completeness of the vocabulary; the extractor never emits them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationshipKind {
    #[serde(rename = "N:1")]
    ManyToOne,
    #[serde(rename = "1:N")]
    OneToMany,
    #[serde(rename = "M:N")]
    ManyToMany,
    #[serde(rename = "CROSS_DB")]
    CrossDb,
    #[serde(rename = "FORMULA_REF")]
    FormulaRef,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::ManyToOne => "N:1",
            RelationshipKind::OneToMany => "1:N",
            RelationshipKind::ManyToMany => "M:N",
            RelationshipKind::CrossDb => "CROSS_DB",
            RelationshipKind::FormulaRef => "FORMULA_REF",
        }
    }

    pub fn all() -> &'static [RelationshipKind] {
        &[
            RelationshipKind::ManyToOne,
            RelationshipKind::OneToMany,
            RelationshipKind::ManyToMany,
            RelationshipKind::CrossDb,
            RelationshipKind::FormulaRef,
        ]
    }

    /// Structural kinds come from the schema, not from code.
    pub fn is_structural(&self) -> bool {
        !matches!(self, RelationshipKind::FormulaRef)
    }
}

impl FromStr for RelationshipKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "N:1" | "N1" => Ok(RelationshipKind::ManyToOne),
            "1:N" | "1N" => Ok(RelationshipKind::OneToMany),
            "M:N" | "MN" => Ok(RelationshipKind::ManyToMany),
            "CROSS_DB" | "CROSSDB" => Ok(RelationshipKind::CrossDb),
            "FORMULA_REF" | "FORMULA" => Ok(RelationshipKind::FormulaRef),
            _ => Err(crate::Error::InvalidKind(format!("Unknown relationship type: {}", s))),
        }
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A relationship from a table (and optionally one of its fields) to a target table.
///
/// Equality and hashing only consider the identity
/// `(database_id, source_table_name, source_field_name, target_table_name, kind)`, so
/// repeated detections of the same edge collapse in a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub database_id: String,
    pub database_name: String,
    pub source_table_id: String,
    pub source_table_name: String,
    pub source_field_id: Option<String>,
    pub source_field_name: Option<String>,
    pub target_table_id: Option<String>,
    pub target_table_name: String,
    pub target_database_id: Option<String>,
    pub target_database_name: Option<String>,
    #[serde(rename = "relationship_type")]
    pub kind: RelationshipKind,
    pub is_composition: bool,
    /// Code type of the script a `FORMULA_REF` was found in
    pub found_in_code_type: Option<String>,
    /// Leading part of that script
    pub found_in_code: Option<String>,
}

impl Relationship {
    /// Create a relationship with no field, database or code details.
    pub fn new(
        database_id: impl Into<String>,
        database_name: impl Into<String>,
        source_table_id: impl Into<String>,
        source_table_name: impl Into<String>,
        target_table_name: impl Into<String>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            database_name: database_name.into(),
            source_table_id: source_table_id.into(),
            source_table_name: source_table_name.into(),
            source_field_id: None,
            source_field_name: None,
            target_table_id: None,
            target_table_name: target_table_name.into(),
            target_database_id: None,
            target_database_name: None,
            kind,
            is_composition: false,
            found_in_code_type: None,
            found_in_code: None,
        }
    }

    pub fn with_source_field(mut self, id: Option<String>, name: Option<String>) -> Self {
        self.source_field_id = id;
        self.source_field_name = name;
        self
    }

    pub fn with_code(mut self, code_type: impl Into<String>, snippet: impl Into<String>) -> Self {
        self.found_in_code_type = Some(code_type.into());
        self.found_in_code = Some(snippet.into());
        self
    }

    /// The deduplication key.
    pub fn identity(&self) -> (&str, &str, Option<&str>, &str, RelationshipKind) {
        (
            &self.database_id,
            &self.source_table_name,
            self.source_field_name.as_deref(),
            &self.target_table_name,
            self.kind,
        )
    }

    /// Does `table` appear on either end?
    pub fn touches(&self, table: &str) -> bool {
        self.source_table_name == table || self.target_table_name == table
    }
}

impl PartialEq for Relationship {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Relationship {}

impl std::hash::Hash for Relationship {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// How a script reaches into another database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossDbKind {
    #[serde(rename = "do as database")]
    DoAsDatabase,
    #[serde(rename = "do as server")]
    DoAsServer,
    #[serde(rename = "openDatabase")]
    OpenDatabase,
}

impl CrossDbKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossDbKind::DoAsDatabase => "do as database",
            CrossDbKind::DoAsServer => "do as server",
            CrossDbKind::OpenDatabase => "openDatabase",
        }
    }
}

impl FromStr for CrossDbKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "do as database" => Ok(CrossDbKind::DoAsDatabase),
            "do as server" => Ok(CrossDbKind::DoAsServer),
            "openDatabase" => Ok(CrossDbKind::OpenDatabase),
            _ => Err(crate::Error::InvalidKind(format!("Unknown reference type: {}", s))),
        }
    }
}

impl std::fmt::Display for CrossDbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target name recorded for `do as server` blocks.
pub const SERVER_TARGET: &str = "(server)";

/// A script that executes in, or opens, another database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDependency {
    /// Owning script row, 0 until persisted
    pub script_id: i64,
    pub source_database_id: String,
    pub source_database_name: String,
    pub target_database_name: String,
    pub reference_type: CrossDbKind,
    /// Whitespace-normalized text around the match
    pub code_snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn formula_ref(field: &str, snippet: &str) -> Relationship {
        Relationship::new("db", "CRM", "A", "Orders", "Customers", RelationshipKind::FormulaRef)
            .with_source_field(Some("B".into()), Some(field.into()))
            .with_code("fn", snippet)
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in RelationshipKind::all() {
            let parsed: RelationshipKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
        assert!(!RelationshipKind::FormulaRef.is_structural());
        assert!(RelationshipKind::CrossDb.is_structural());
    }

    #[test]
    fn test_identity_ignores_details() {
        let a = formula_ref("Total", "select Customers");
        let b = formula_ref("Total", "first(Customers)");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_identity_distinguishes_fields_and_kinds() {
        let a = formula_ref("Total", "x");
        let b = formula_ref("Count", "x");
        assert_ne!(a, b);

        let mut c = a.clone();
        c.kind = RelationshipKind::ManyToOne;
        assert_ne!(a, c);
    }

    #[test]
    fn test_cross_db_kind_strings() {
        for kind in [CrossDbKind::DoAsDatabase, CrossDbKind::DoAsServer, CrossDbKind::OpenDatabase] {
            assert_eq!(kind.as_str().parse::<CrossDbKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_serialized_kind_names() {
        let json = serde_json::to_value(RelationshipKind::ManyToOne).unwrap();
        assert_eq!(json, serde_json::json!("N:1"));
    }
}
