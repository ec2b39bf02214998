use tabled::{settings::Style, Table, Tabled};

use crate::model::DatabaseSummary;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

/// Grouped counts as returned by the statistics queries
pub fn counts_table(counts: &[(String, usize)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, count) in counts {
        builder.add_row(label, &count.to_string());
    }
    builder.build()
}

#[derive(Tabled)]
struct DatabaseRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Tables")]
    tables: usize,
    #[tabled(rename = "Scripts")]
    scripts: usize,
}

pub fn databases_table(databases: &[DatabaseSummary]) -> String {
    if databases.is_empty() {
        return String::new();
    }
    let rows: Vec<DatabaseRow> = databases
        .iter()
        .map(|d| DatabaseRow {
            id: d.database.id.clone(),
            name: d.database.name.clone(),
            tables: d.table_count,
            scripts: d.script_count,
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}
