//! Relationships declared by reference fields

use crate::ingest::IngestedDatabase;
use crate::relationship::{Relationship, RelationshipKind};

/// One relationship per reference field with a target: `CROSS_DB` if the field names a
/// target database, `N:1` otherwise.
pub fn structural_relationships(ingested: &IngestedDatabase) -> Vec<Relationship> {
    let database = &ingested.database;

    ingested
        .fields
        .iter()
        .filter(|field| field.is_reference())
        .filter_map(|field| {
            let target = field.ref_table_name.clone()?;
            let source_table = ingested.index.name(&field.table_id).unwrap_or(field.table_id.as_str());
            let kind = if field.is_cross_database() {
                RelationshipKind::CrossDb
            } else {
                RelationshipKind::ManyToOne
            };

            let mut relationship = Relationship::new(
                &database.id,
                &database.name,
                &field.table_id,
                source_table,
                target,
                kind,
            )
            .with_source_field(Some(field.field_id.clone()), Some(field.name.clone()));
            relationship.target_table_id = field.ref_table_id.clone();
            relationship.target_database_id = field.ref_database_id.clone();
            relationship.target_database_name = field.ref_database_name.clone();
            relationship.is_composition = field.is_composition;
            Some(relationship)
        })
        .collect()
}
