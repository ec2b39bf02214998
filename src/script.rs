//! Script locations - every piece of embedded code found in a schema
//!
//! A script is identified by where it lives (team → database → table → element) and
//! by the schema attribute it came from (`code_type`, e.g. `fn` or `onClick`). The
//! attribute also determines a coarse `CodeCategory`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Coarse classification of a script by the attribute it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeCategory {
    Global,
    Trigger,
    Formula,
    Button,
    Visibility,
    Permission,
    #[serde(rename = "dchoice")]
    DynamicChoice,
    Validation,
    Reference,
    View,
    Report,
    Other,
}

impl CodeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeCategory::Global => "global",
            CodeCategory::Trigger => "trigger",
            CodeCategory::Formula => "formula",
            CodeCategory::Button => "button",
            CodeCategory::Visibility => "visibility",
            CodeCategory::Permission => "permission",
            CodeCategory::DynamicChoice => "dchoice",
            CodeCategory::Validation => "validation",
            CodeCategory::Reference => "reference",
            CodeCategory::View => "view",
            CodeCategory::Report => "report",
            CodeCategory::Other => "other",
        }
    }

    pub fn all() -> &'static [CodeCategory] {
        &[
            CodeCategory::Global,
            CodeCategory::Trigger,
            CodeCategory::Formula,
            CodeCategory::Button,
            CodeCategory::Visibility,
            CodeCategory::Permission,
            CodeCategory::DynamicChoice,
            CodeCategory::Validation,
            CodeCategory::Reference,
            CodeCategory::View,
            CodeCategory::Report,
            CodeCategory::Other,
        ]
    }
}

impl FromStr for CodeCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CodeCategory::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::InvalidKind(format!("Unknown code category: {}", s)))
    }
}

impl std::fmt::Display for CodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Code-bearing attributes on the database itself.
pub const DATABASE_CODE_FIELDS: &[(&str, CodeCategory)] = &[
    ("afterOpen", CodeCategory::Trigger),
    ("beforeOpen", CodeCategory::Trigger),
    ("globalCode", CodeCategory::Global),
];

/// Code-bearing attributes on a table.
pub const TABLE_CODE_FIELDS: &[(&str, CodeCategory)] = &[
    ("afterCreate", CodeCategory::Trigger),
    ("afterUpdate", CodeCategory::Trigger),
    ("afterDelete", CodeCategory::Trigger),
    ("beforeDelete", CodeCategory::Trigger),
    ("canRead", CodeCategory::Permission),
    ("canWrite", CodeCategory::Permission),
    ("canCreate", CodeCategory::Permission),
    ("canDelete", CodeCategory::Permission),
    ("printout", CodeCategory::Other),
];

/// Code-bearing attributes on a field.
pub const FIELD_CODE_FIELDS: &[(&str, CodeCategory)] = &[
    ("fn", CodeCategory::Formula),
    ("afterUpdate", CodeCategory::Trigger),
    ("afterCreate", CodeCategory::Trigger),
    ("constraint", CodeCategory::Validation),
    ("dchoiceValues", CodeCategory::DynamicChoice),
    ("dchoiceCaption", CodeCategory::DynamicChoice),
    ("dchoiceColor", CodeCategory::DynamicChoice),
    ("dchoiceIcon", CodeCategory::DynamicChoice),
    ("referenceFormat", CodeCategory::Reference),
    ("visibility", CodeCategory::Visibility),
    ("onClick", CodeCategory::Button),
    ("onDoubleClick", CodeCategory::Button),
    ("canRead", CodeCategory::Permission),
    ("canWrite", CodeCategory::Permission),
    ("validation", CodeCategory::Validation),
    ("color", CodeCategory::Other),
];

/// Formulas shorter than this are noise (`0`, `""`) and are not recorded.
pub const MIN_FORMULA_LEN: usize = 3;

/// Number of newline-delimited segments in `code`.
pub fn line_count(code: &str) -> usize {
    if code.is_empty() {
        0
    } else {
        code.split('\n').count()
    }
}

/// Team the scripts were extracted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: String,
    pub name: String,
}

impl TeamInfo {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        let id = id.into();
        let name = name.unwrap_or_else(|| id.clone());
        Self { id, name }
    }
}

/// A code location.
///
/// `table_*` is `None` for database-level code, `element_*` is `None` for
/// database- and table-level code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    /// Row ID, 0 until persisted
    pub id: i64,
    pub team_id: String,
    pub team_name: String,
    pub database_id: String,
    pub database_name: String,
    pub table_id: Option<String>,
    pub table_name: Option<String>,
    pub element_id: Option<String>,
    pub element_name: Option<String>,
    pub code_type: String,
    pub code_category: CodeCategory,
    code: String,
    line_count: usize,
}

impl Script {
    /// Database-level script
    pub fn new(
        team: &TeamInfo,
        database_id: impl Into<String>,
        database_name: impl Into<String>,
        code_type: impl Into<String>,
        code_category: CodeCategory,
        code: impl Into<String>,
    ) -> Self {
        let code = code.into();
        Self {
            id: 0,
            team_id: team.id.clone(),
            team_name: team.name.clone(),
            database_id: database_id.into(),
            database_name: database_name.into(),
            table_id: None,
            table_name: None,
            element_id: None,
            element_name: None,
            code_type: code_type.into(),
            code_category,
            line_count: line_count(&code),
            code,
        }
    }

    /// Attach the owning table
    pub fn in_table(mut self, table_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        self.table_id = Some(table_id.into());
        self.table_name = Some(table_name.into());
        self
    }

    /// Attach the owning element (field, button, ...)
    pub fn on_element(mut self, element_id: impl Into<String>, element_name: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self.element_name = Some(element_name.into());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Replace the code, keeping `line_count` in sync.
    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
        self.line_count = line_count(&self.code);
    }

    /// `Database.Table.Element` path for display.
    pub fn location(&self) -> String {
        let mut location = format!(
            "{}.{}",
            self.database_name,
            self.table_name.as_deref().unwrap_or("(DB)")
        );
        if let Some(element) = &self.element_name {
            location.push('.');
            location.push_str(element);
        }
        location
    }
}
