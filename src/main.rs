//! ninox-schema CLI - index and search Ninox schemas and scripts

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use ninox_schema::config;
use ninox_schema::extract::{self, ExtractContext};
use ninox_schema::format::format_code_with;
use ninox_schema::linker::ScanMode;
use ninox_schema::relationship::{Relationship, RelationshipKind};
use ninox_schema::source::DumpDirSource;
use ninox_schema::storage::{RelationshipFilter, SearchFilter, SqliteStore};
use ninox_schema::script::TeamInfo;
use ninox_schema::ui::{self, Icons, theme};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ninox-schema")]
#[command(version = "0.1.0")]
#[command(about = "Ninox schema & script index - full-text search and reference graph")]
#[command(long_about = r#"
ninox-schema extracts the schemas of Ninox databases into a local SQLite index:
  • Full-text search over every script (formulas, triggers, buttons, global code)
  • Table relationships from reference fields and formulas
  • Cross-database dependencies (do as database, openDatabase)

Example usage:
  ninox-schema extract --env dev
  ninox-schema search "select Kunden"
  ninox-schema deps Rechnungen
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the index database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract schemas into a fresh index
    Extract {
        /// Environment from the config file
        #[arg(short, long)]
        env: Option<String>,

        /// Dump directory (instead of an environment)
        #[arg(short, long, requires = "team")]
        source: Option<PathBuf>,

        /// Team ID (with --source)
        #[arg(short, long)]
        team: Option<String>,

        /// Team name (with --source)
        #[arg(long)]
        team_name: Option<String>,

        /// Only these database IDs or names
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,

        /// How scripts are scanned for references
        #[arg(long)]
        scan_mode: Option<ScanMode>,
    },

    /// Full-text search over scripts
    Search {
        /// FTS5 query
        query: String,

        /// Filter by database ID or name
        #[arg(long)]
        db: Option<String>,

        /// Filter by table name
        #[arg(long)]
        table: Option<String>,

        /// Filter by code type (fn, onClick, ...)
        #[arg(long)]
        code_type: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Print the full code of each hit
        #[arg(long)]
        code: bool,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what a table references and what references it
    Deps {
        /// Table name
        table: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Show statistics about the index
    Stats {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// List indexed entities
    List {
        #[arg(value_enum, default_value = "databases")]
        what: ListKind,

        /// Restrict to one database (ID, or name where supported)
        #[arg(long)]
        db: Option<String>,

        /// Relationship type (N:1, 1:N, M:N, CROSS_DB, FORMULA_REF)
        #[arg(long)]
        kind: Option<RelationshipKind>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one script
    Show {
        /// Script ID (from search results)
        id: i64,
    },

    /// Export the index as JSON
    Export {
        /// Only this database ID
        #[arg(long)]
        db: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Format Ninox code from a file or stdin
    Format {
        /// File to format ("-" or omitted for stdin)
        file: Option<PathBuf>,

        /// Spaces per indentation level
        #[arg(long, default_value_t = ninox_schema::format::DEFAULT_INDENT)]
        indent: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Databases,
    Tables,
    Relationships,
    Dependencies,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let config = config::load_config(Some(&config_path))?.unwrap_or_default();
    let db_path = cli.database.clone().unwrap_or_else(|| config.database_path());

    match cli.command {
        Commands::Extract { env, source, team, team_name, only, scan_mode } => {
            let mut options = config.extract;
            if let Some(mode) = scan_mode {
                options.scan_mode = mode;
            }
            let (source, mut ctx) = match (env, source, team) {
                (_, Some(dir), Some(team)) => (
                    DumpDirSource::new(dir),
                    ExtractContext::new(TeamInfo::new(team, team_name)).with_options(options),
                ),
                (Some(name), _, _) => {
                    let base = config_path.parent().unwrap_or(Path::new("."));
                    config.environment(&name)?.extraction(base, options)
                }
                _ => anyhow::bail!("either --env or --source with --team is required"),
            };
            if !only.is_empty() {
                ctx.databases = only;
            }
            run_extract(&db_path, &source, &ctx)?;
        }

        Commands::Search { query, db, table, code_type, limit, code, json } => {
            let store = open_existing(&db_path)?;
            let filter = SearchFilter { database: db, table, code_type };
            let hits = store.search(&query, &filter, limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                ui::warn("No scripts found.");
            } else {
                println!("{} {} hit(s) for '{}'", Icons::SEARCH, hits.len(), query);
                for hit in &hits {
                    let script = &hit.script;
                    println!();
                    println!(
                        "{} {} {} {}",
                        Icons::FILE,
                        ui::strong(&script.location()),
                        ui::dim(&format!("[{}]", script.code_type)),
                        ui::muted(&format!("#{}", script.id))
                    );
                    if code {
                        println!("{}", ui::numbered(&ui::render_code(script.code(), theme()), theme()));
                    } else if let Some(excerpt) = &hit.highlighted {
                        let preview = ninox_schema::format::code_preview(excerpt, 300);
                        println!("  {}", ui::render_excerpt(&preview, theme()));
                    } else {
                        println!("  {}", ninox_schema::format::code_preview(script.code(), 300));
                    }
                }
            }
        }

        Commands::Deps { table, json } => {
            let store = open_existing(&db_path)?;
            let deps = store.dependencies(&table)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&deps)?);
            } else {
                ui::header(&format!("Dependencies of {}", table));
                ui::section(&format!(" {} References ", Icons::RIGHT));
                print_relationships(&deps.references);
                ui::section(&format!(" {} Referenced by ", Icons::LEFT));
                print_relationships(&deps.referenced_by);
                ui::section(&format!(" {} Formula references ", Icons::FORMULA));
                print_relationships(&deps.formula_references);
            }
        }

        Commands::Stats { json } => {
            let store = open_existing(&db_path)?;
            let stats = store.statistics()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{} Index Statistics ({:?})", Icons::STATS, db_path);
                let mut table = ui::TableBuilder::new();
                table.add_row("Databases", &stats.databases.to_string());
                table.add_row("Tables", &stats.tables.to_string());
                table.add_row("Fields", &stats.fields.to_string());
                table.add_row("Relationships", &stats.relationships.to_string());
                table.add_row("Scripts", &stats.scripts.to_string());
                table.add_row("Script dependencies", &stats.script_dependencies.to_string());
                println!("{}", table.build());
                for (title, counts) in [
                    ("Scripts by type", &stats.scripts_by_type),
                    ("Relationships by type", &stats.relationships_by_type),
                    ("Top tables by scripts", &stats.top_tables),
                    ("Scripts by database", &stats.scripts_by_database),
                ] {
                    if !counts.is_empty() {
                        ui::section(&format!(" {} ", title));
                        println!("{}", ui::counts_table(counts));
                    }
                }
            }
        }

        Commands::List { what, db, kind, json } => {
            let store = open_existing(&db_path)?;
            match what {
                ListKind::Databases => {
                    let databases = store.list_databases()?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&databases)?);
                    } else {
                        println!("{}", ui::databases_table(&databases));
                    }
                }
                ListKind::Tables => {
                    let tables = store.list_tables(db.as_deref())?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&tables)?);
                    } else {
                        for table in &tables {
                            println!(
                                "{} {} {} {}",
                                Icons::TABLE,
                                table.name,
                                ui::dim(&format!("({} fields)", table.field_count)),
                                ui::muted(&format!("{}/{}", table.database_id, table.table_id))
                            );
                        }
                    }
                }
                ListKind::Relationships => {
                    let filter = RelationshipFilter {
                        database: db,
                        kind,
                        ..RelationshipFilter::default()
                    };
                    let relationships = store.relationships(&filter)?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&relationships)?);
                    } else {
                        print_relationships(&relationships);
                    }
                }
                ListKind::Dependencies => {
                    let dependencies = store.script_dependencies(db.as_deref())?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&dependencies)?);
                    } else {
                        for dep in &dependencies {
                            println!(
                                "{} {} {} {} {}",
                                Icons::LINK,
                                dep.source_database_name,
                                Icons::RIGHT,
                                dep.target_database_name,
                                ui::dim(&format!("[{}] {}", dep.reference_type, dep.code_snippet))
                            );
                        }
                    }
                }
            }
        }

        Commands::Show { id } => {
            let store = open_existing(&db_path)?;
            match store.script(id)? {
                Some(script) => {
                    ui::header(&format!("{} [{}]", script.location(), script.code_type));
                    println!("{}", ui::numbered(&ui::render_code(script.code(), theme()), theme()));
                }
                None => anyhow::bail!("no script with id {}", id),
            }
        }

        Commands::Export { db, output } => {
            let store = open_existing(&db_path)?;
            let export = store.export(db.as_deref())?;
            let json = serde_json::to_string_pretty(&export)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    ui::success(&format!("Exported {} database(s) to {:?}", export.databases.len(), path));
                }
                None => println!("{}", json),
            }
        }

        Commands::Format { file, indent } => {
            let code = match file {
                Some(path) if path != Path::new("-") => std::fs::read_to_string(&path)?,
                _ => {
                    let mut code = String::new();
                    std::io::stdin().read_to_string(&mut code)?;
                    code
                }
            };
            println!("{}", ui::render_code(&format_code_with(&code, indent), theme()));
        }
    }

    Ok(())
}

fn run_extract(db_path: &Path, source: &DumpDirSource, ctx: &ExtractContext) -> anyhow::Result<()> {
    config::ensure_db_dir(db_path)?;
    ui::header(&format!("Extracting team {}", ctx.team.id));
    ui::status(Icons::PACKAGE, "Source", &source.dir().display().to_string());
    ui::status(Icons::DATABASE, "Index", &db_path.display().to_string());
    ui::info("Scan mode", ctx.options.scan_mode.as_str());

    let mut store = SqliteStore::open_for_refresh(db_path)?;
    let stats = extract::run(&mut store, source, ctx)?;

    ui::section(&format!("{} Extracted", Icons::STATS));
    ui::summary_row("Databases", &stats.databases.to_string());
    ui::summary_row("Tables", &stats.tables.to_string());
    ui::summary_row("Fields", &stats.fields.to_string());
    ui::summary_row("Scripts", &stats.scripts.to_string());
    ui::summary_row("Script dependencies", &stats.dependencies.to_string());
    ui::summary_row("Relationships", &stats.relationships.to_string());
    for (kind, count) in &stats.graph.by_kind {
        ui::summary_row(&format!("  {}", kind), &count.to_string());
    }
    println!();

    for database in &stats.failed {
        ui::error(&format!("Skipped database {}", database));
    }
    if stats.failed.is_empty() {
        ui::success("Extraction complete!");
    } else {
        ui::warn(&format!("Extraction finished, {} database(s) skipped", stats.failed.len()));
    }
    Ok(())
}

fn open_existing(db_path: &Path) -> anyhow::Result<SqliteStore> {
    if !db_path.exists() {
        anyhow::bail!("index {:?} not found (run `ninox-schema extract` first)", db_path);
    }
    Ok(SqliteStore::open(db_path)?)
}

fn print_relationships(relationships: &[Relationship]) {
    if relationships.is_empty() {
        println!("  {}", ui::muted("(none)"));
        return;
    }
    for rel in relationships {
        let source = match &rel.source_field_name {
            Some(field) => format!("{}.{}", rel.source_table_name, field),
            None => rel.source_table_name.clone(),
        };
        let target = match &rel.target_database_name {
            Some(database) => format!("{}::{}", database, rel.target_table_name),
            None => rel.target_table_name.clone(),
        };
        println!(
            "  {} {} {} {}",
            ui::dim(&format!("[{}]", rel.kind)),
            source,
            Icons::RIGHT,
            target
        );
    }
}
