//! Typed view of the schema document returned by the Ninox API
//!
//! Shape: `{settings: {name, color, icon}, schema: {version, types: {<id>: TypeDef}, ...}}`.
//! Everything is optional on the wire; missing values fall back to the defaults
//! documented on each field. Attributes not modelled explicitly (script bodies such as
//! `fn` or `onClick`) are kept in `attributes`.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Full schema document for one database.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseDocument {
    pub settings: Settings,
    pub schema: SchemaBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub color: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaBody {
    #[serde(deserialize_with = "lenient::opt_int")]
    pub version: Option<i64>,
    /// Tables keyed by internal type ID, in document order
    pub types: IndexMap<String, TypeDef>,
    /// Database-level attributes (`globalCode`, `afterOpen`, ...)
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// A table definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TypeDef {
    /// Display name; falls back to the type ID
    #[serde(deserialize_with = "lenient::opt_string")]
    pub caption: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub uuid: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub hidden: bool,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub icon: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// A field definition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldDef {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub caption: Option<String>,
    /// Base type (`string`, `number`, `ref`, ...); empty when missing
    #[serde(deserialize_with = "lenient::opt_string")]
    pub base: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub required: bool,
    #[serde(rename = "refTypeId", deserialize_with = "lenient::opt_string")]
    pub ref_type_id: Option<String>,
    #[serde(rename = "refTypeUUID", deserialize_with = "lenient::opt_string")]
    pub ref_type_uuid: Option<String>,
    /// Target database of a cross-database reference
    #[serde(rename = "dbId", deserialize_with = "lenient::opt_string")]
    pub db_id: Option<String>,
    #[serde(rename = "dbName", deserialize_with = "lenient::opt_string")]
    pub db_name: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub composition: bool,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// Non-blank string value of `name` in an attribute map.
fn code_attribute<'a>(attributes: &'a BTreeMap<String, Value>, name: &str) -> Option<&'a str> {
    attributes
        .get(name)
        .and_then(Value::as_str)
        .filter(|code| !code.trim().is_empty())
}

impl SchemaBody {
    pub fn code(&self, name: &str) -> Option<&str> {
        code_attribute(&self.attributes, name)
    }
}

impl TypeDef {
    pub fn code(&self, name: &str) -> Option<&str> {
        code_attribute(&self.attributes, name)
    }

    pub fn caption_or<'a>(&'a self, id: &'a str) -> &'a str {
        self.caption.as_deref().unwrap_or(id)
    }
}

impl FieldDef {
    pub fn code(&self, name: &str) -> Option<&str> {
        code_attribute(&self.attributes, name)
    }

    pub fn caption_or<'a>(&'a self, id: &'a str) -> &'a str {
        self.caption.as_deref().unwrap_or(id)
    }

    pub fn base_type(&self) -> &str {
        self.base.as_deref().unwrap_or("")
    }

    pub fn is_reference(&self) -> bool {
        self.base_type() == "ref"
    }

    pub fn has_formula(&self) -> bool {
        self.code("fn").is_some()
    }
}

/// Deserializers that accept whatever JSON type the API happens to send.
mod lenient {
    use super::*;

    /// Truthiness: `true`, non-zero numbers and non-empty strings other than `"false"`/`"0"`.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
            Value::Null => false,
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        })
    }

    /// Strings pass through, numbers and bools are stringified, anything else is `None`.
    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}
