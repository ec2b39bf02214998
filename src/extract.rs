//! Extraction run
//!
//! Drives fetch → ingest → link → write for every database of a team. A database that
//! fails at any step is logged and skipped; the others still land in the store. The
//! whole run is one refresh transaction, so readers see either the previous index or
//! the complete new one.

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::graph::GraphStats;
use crate::ingest::{IngestedDatabase, ingest, parse_document};
use crate::linker::{LinkOptions, Links, link};
use crate::script::TeamInfo;
use crate::source::{DatabaseRef, SchemaSource};
use crate::storage::{RefreshTx, SqliteStore, WriteStats};
use crate::Result;

/// Everything an extraction run needs besides the source and the store.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub team: TeamInfo,
    pub options: LinkOptions,
    /// Database IDs or names to extract; empty means all
    pub databases: Vec<String>,
}

impl ExtractContext {
    pub fn new(team: TeamInfo) -> Self {
        Self {
            team,
            options: LinkOptions::default(),
            databases: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: LinkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn only(mut self, databases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.databases = databases.into_iter().map(Into::into).collect();
        self
    }

    fn wants(&self, entry: &DatabaseRef) -> bool {
        self.databases.is_empty()
            || self
                .databases
                .iter()
                .any(|d| *d == entry.id || entry.name.as_deref() == Some(d.as_str()))
    }
}

/// One database, ingested and linked, ready to be written.
#[derive(Debug)]
pub struct ExtractedDatabase {
    pub ingested: IngestedDatabase,
    pub links: Links,
}

/// Parse, ingest and link one raw schema document.
pub fn extract_database(
    ctx: &ExtractContext,
    database_id: &str,
    listing_name: Option<&str>,
    raw: Value,
) -> Result<ExtractedDatabase> {
    let document = parse_document(database_id, raw)?;
    let ingested = ingest(&ctx.team, database_id, listing_name, &document);
    let links = link(&ingested, &ctx.options);
    Ok(ExtractedDatabase { ingested, links })
}

/// Totals of an extraction run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    pub databases: usize,
    pub tables: usize,
    pub fields: usize,
    pub relationships: usize,
    pub scripts: usize,
    pub dependencies: usize,
    /// Linked relationships per kind
    pub graph: GraphStats,
    /// IDs of skipped databases
    pub failed: Vec<String>,
}

impl ExtractionStats {
    fn add(&mut self, written: &WriteStats, graph: &GraphStats) {
        self.graph.merge(graph);
        self.databases += 1;
        self.tables += written.tables;
        self.fields += written.fields;
        self.relationships += written.relationships;
        self.scripts += written.scripts;
        self.dependencies += written.dependencies;
    }
}

impl std::fmt::Display for ExtractionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Extraction Statistics:")?;
        writeln!(f, "  Databases: {}", self.databases)?;
        writeln!(f, "  Tables: {}", self.tables)?;
        writeln!(f, "  Fields: {}", self.fields)?;
        writeln!(f, "  Relationships: {}", self.relationships)?;
        for (kind, count) in &self.graph.by_kind {
            writeln!(f, "    {}: {}", kind, count)?;
        }
        writeln!(f, "  Scripts: {}", self.scripts)?;
        write!(f, "  Script dependencies: {}", self.dependencies)?;
        if !self.failed.is_empty() {
            write!(f, "\n  Skipped: {}", self.failed.join(", "))?;
        }
        Ok(())
    }
}

fn extract_one(
    refresh: &mut RefreshTx<'_>,
    source: &dyn SchemaSource,
    ctx: &ExtractContext,
    entry: &DatabaseRef,
) -> Result<(WriteStats, GraphStats)> {
    let raw = source.fetch_schema(&entry.id)?;
    let extracted = extract_database(ctx, &entry.id, entry.name.as_deref(), raw)?;
    let written = refresh.write_database(&extracted.ingested, &extracted.links)?;
    Ok((written, extracted.links.relationships.stats()))
}

/// Replace the store contents with a fresh extraction of every wanted database.
///
/// Fails only when the listing cannot be fetched or the store itself fails; the store
/// is left untouched in that case.
pub fn run(store: &mut SqliteStore, source: &dyn SchemaSource, ctx: &ExtractContext) -> Result<ExtractionStats> {
    let listing = source.list_databases()?;
    info!(team = %ctx.team.id, databases = listing.len(), "Starting extraction");

    let mut stats = ExtractionStats::default();
    let mut refresh = store.begin_refresh()?;

    for entry in listing.iter().filter(|entry| ctx.wants(entry)) {
        match extract_one(&mut refresh, source, ctx, entry) {
            Ok((written, graph)) => {
                info!(
                    database = %entry.id,
                    tables = written.tables,
                    scripts = written.scripts,
                    relationships = written.relationships,
                    "Extracted database"
                );
                stats.add(&written, &graph);
            }
            Err(e) => {
                error!(database = %entry.id, error = %e, "Skipping database");
                stats.failed.push(entry.id.clone());
            }
        }
    }

    refresh.commit()?;
    Ok(stats)
}
