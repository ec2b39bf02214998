//! Relationship Graph - In-memory collection of extracted relationships
//!
//! Collects relationships from all linker passes before they are persisted.
//! The first detection of an identity wins; later duplicates are dropped.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use serde::Serialize;

use crate::relationship::{Relationship, RelationshipKind};

/// Deduplicating, insertion-ordered set of relationships.
#[derive(Debug, Default)]
pub struct RelationshipSet {
    relationships: IndexSet<Relationship>,
}

impl RelationshipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relationship. Returns `false` if one with the same identity is already present.
    pub fn insert(&mut self, relationship: Relationship) -> bool {
        self.relationships.insert(relationship)
    }

    /// Add every relationship, returning how many were new.
    pub fn extend<I: IntoIterator<Item = Relationship>>(&mut self, relationships: I) -> usize {
        let mut added = 0;
        for relationship in relationships {
            if self.relationships.insert(relationship) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    /// Relationships of one kind, in insertion order
    pub fn of_kind(&self, kind: RelationshipKind) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(move |r| r.kind == kind)
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        for relationship in &self.relationships {
            stats.total += 1;
            *stats.by_kind.entry(relationship.kind).or_default() += 1;
        }
        stats
    }
}

impl FromIterator<Relationship> for RelationshipSet {
    fn from_iter<I: IntoIterator<Item = Relationship>>(iter: I) -> Self {
        let mut set = RelationshipSet::new();
        set.extend(iter);
        set
    }
}

/// Relationship counts per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub total: usize,
    pub by_kind: BTreeMap<RelationshipKind, usize>,
}

impl GraphStats {
    pub fn merge(&mut self, other: &GraphStats) {
        self.total += other.total;
        for (kind, count) in &other.by_kind {
            *self.by_kind.entry(*kind).or_default() += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(source: &str, target: &str, kind: RelationshipKind) -> Relationship {
        Relationship::new("db", "CRM", "A", source, target, kind)
            .with_source_field(None, Some("fn".into()))
    }

    #[test]
    fn test_first_detection_wins() {
        let mut set = RelationshipSet::new();
        let first = rel("Orders", "Customers", RelationshipKind::FormulaRef).with_code("fn", "first");
        let second = rel("Orders", "Customers", RelationshipKind::FormulaRef).with_code("fn", "second");

        assert!(set.insert(first));
        assert!(!set.insert(second));
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().found_in_code.as_deref(), Some("first"));
    }

    #[test]
    fn test_extend_counts_new() {
        let mut set = RelationshipSet::new();
        set.insert(rel("Orders", "Customers", RelationshipKind::ManyToOne).with_code("fn", "kept"));

        let added = set.extend(vec![
            rel("Orders", "Customers", RelationshipKind::ManyToOne).with_code("fn", "dropped"),
            rel("Invoices", "Orders", RelationshipKind::ManyToOne),
        ]);
        assert_eq!(added, 1);
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().next().unwrap().found_in_code.as_deref(), Some("kept"));
    }

    #[test]
    fn test_insertion_order_kept() {
        let set: RelationshipSet = vec![
            rel("Orders", "Customers", RelationshipKind::ManyToOne),
            rel("Invoices", "Orders", RelationshipKind::ManyToOne),
            rel("Orders", "Customers", RelationshipKind::ManyToOne),
            rel("Orders", "Products", RelationshipKind::FormulaRef),
        ]
        .into_iter()
        .collect();

        let targets: Vec<_> = set.iter().map(|r| r.target_table_name.as_str()).collect();
        assert_eq!(targets, vec!["Customers", "Orders", "Products"]);
    }

    #[test]
    fn test_stats() {
        let mut set = RelationshipSet::new();
        set.insert(rel("Orders", "Customers", RelationshipKind::ManyToOne));
        set.insert(rel("Invoices", "Orders", RelationshipKind::ManyToOne));
        set.insert(rel("Orders", "Products", RelationshipKind::FormulaRef));

        assert_eq!(set.of_kind(RelationshipKind::FormulaRef).count(), 1);

        let mut stats = set.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_kind[&RelationshipKind::ManyToOne], 2);
        assert_eq!(stats.by_kind[&RelationshipKind::FormulaRef], 1);

        stats.merge(&set.stats());
        assert_eq!(stats.total, 6);
        assert_eq!(stats.by_kind[&RelationshipKind::ManyToOne], 4);
    }
}
