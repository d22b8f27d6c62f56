//! # Daybook CLI (`dbk`)
//!
//! The `dbk` binary is the primary interface for Daybook. It provides
//! commands for index initialization, one-shot and continuous indexing,
//! search, note retrieval, and index inspection.
//!
//! ## Usage
//!
//! ```bash
//! dbk --config ./daybook.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dbk init` | Create the SQLite index and run schema migrations |
//! | `dbk index [PATH]` | Index the notes root, or a single note file |
//! | `dbk watch` | Watch the notes root and keep the index current |
//! | `dbk search "<query>"` | Search indexed notes |
//! | `dbk show <id>` | Print a full note by id |
//! | `dbk remove <id>` | Drop a note from the index |
//! | `dbk reindex` | Rebuild the index from the notes on disk |
//! | `dbk entities` | List tracked people |
//! | `dbk stats` | Show index counts |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the index
//! dbk init --config ./daybook.toml
//!
//! # Index the whole notes root
//! dbk index
//!
//! # Keep the index current while editing
//! dbk watch
//!
//! # Structured search
//! dbk search "@hannah #meeting past week"
//!
//! # Machine-readable output
//! dbk search "category:work" --json
//! ```

mod config;
mod db;
mod engine;
mod error;
mod index;
mod ingest;
mod migrate;
mod models;
mod parse;
mod query;
mod scan;
mod snippet;
mod watch;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Daybook CLI, a local-first index and search engine for dated,
/// front-matter-tagged notes.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `daybook.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dbk",
    about = "A local-first index and search engine for dated notes",
    version,
    long_about = "Daybook indexes a directory of dated Markdown notes into SQLite, extracting \
    front matter, #tags, and @mentions, and answers structured queries (people, tags, \
    categories, date ranges, free text) from the index. A watch mode keeps the index \
    current as notes are edited."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./daybook.toml`. The notes root, index location, watch
    /// debounce, and retrieval settings are read from this file.
    #[arg(long, global = true, default_value = "./daybook.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database.
    ///
    /// Creates the SQLite database file and all required tables (notes,
    /// entities, note_mentions, notes_fts). Running it again is safe.
    Init,

    /// Index notes from disk.
    ///
    /// Walks the notes root, parses every dated note file, and upserts each
    /// one into the index. Files whose content is unchanged since the last
    /// run are skipped. Pass a PATH to index a single note file instead.
    Index {
        /// A single note file to index instead of the whole root.
        path: Option<PathBuf>,

        /// Reindex files even when their content hash is unchanged.
        #[arg(long)]
        full: bool,
    },

    /// Watch the notes root and keep the index current.
    ///
    /// Performs a catch-up pass over existing notes, then applies file
    /// changes as they happen. Rapid saves to one file are coalesced;
    /// deletions are applied immediately. Runs until interrupted.
    Watch,

    /// Search indexed notes.
    ///
    /// The query may combine free text with @person, #tag, category: and
    /// date expressions ("past week", "from 2025-01-01 to 2025-01-31").
    /// Explicit flags override whatever the query text implies.
    Search {
        /// The search query string. Empty means "recent notes".
        #[arg(default_value = "")]
        query: String,

        /// Only notes mentioning this person (with or without the `@`).
        #[arg(long)]
        person: Option<String>,

        /// Only notes carrying this tag (with or without the `#`).
        #[arg(long)]
        tag: Option<String>,

        /// Only notes in this category.
        #[arg(long)]
        category: Option<String>,

        /// Only notes dated on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only notes dated on or before this date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a full note by id.
    Show {
        /// Note id (the file's date stem, e.g. 2025-01-05).
        id: String,

        /// Print the note as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Drop a note from the index.
    ///
    /// Removes the note row, its search entries, and its mention links.
    /// The file on disk is untouched. Removing an unknown id is a no-op.
    Remove {
        /// Note id (the file's date stem).
        id: String,
    },

    /// Rebuild the index from the notes on disk.
    ///
    /// Drops all derived state (including entity mention counts) and
    /// reindexes every note found under the notes root.
    Reindex,

    /// List tracked people.
    Entities {
        /// Filter by entity kind (currently only `person`).
        #[arg(long)]
        kind: Option<String>,

        /// Print entities as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show index counts.
    Stats {
        /// Print stats as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DAYBOOK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            println!("Index initialized at {}", cfg.index_db_path().display());
        }
        Commands::Index { path, full } => {
            let idx = open_index(&cfg).await?;
            match path {
                Some(path) => index_one(&cfg, &idx, &path, full).await?,
                None => ingest::index_all(&cfg, &idx, full).await?,
            }
        }
        Commands::Watch => {
            let idx = open_index(&cfg).await?;
            ingest::run_watch(&cfg, &idx).await?;
        }
        Commands::Search {
            query,
            person,
            tag,
            category,
            since,
            until,
            limit,
            json,
        } => {
            let idx = open_index(&cfg).await?;

            let today = chrono::Utc::now().date_naive();
            let mut parsed = query::parse_query(&query, today);
            if let Some(p) = person {
                parsed.person = Some(p.trim_start_matches('@').to_lowercase());
            }
            if let Some(t) = tag {
                parsed.tag = Some(t.trim_start_matches('#').to_string());
            }
            if let Some(c) = category {
                parsed.category = Some(c);
            }
            if let Some(s) = since {
                parsed.since = Some(NaiveDate::parse_from_str(&s, "%Y-%m-%d")?);
            }
            if let Some(u) = until {
                parsed.until = Some(NaiveDate::parse_from_str(&u, "%Y-%m-%d")?);
            }
            if let Some(n) = limit {
                parsed.limit = Some(n);
            }

            let hits = engine::execute(&idx, &parsed, today, &cfg.retrieval).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_hits(&hits);
            }
        }
        Commands::Show { id, json } => {
            let idx = open_index(&cfg).await?;
            let note = idx
                .get(&id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("note not found: {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&note)?);
            } else {
                print_note(&note);
            }
        }
        Commands::Remove { id } => {
            let idx = open_index(&cfg).await?;
            if idx.remove(&id).await? {
                println!("Removed {id} from the index.");
            } else {
                println!("Not indexed: {id}");
            }
        }
        Commands::Reindex => {
            let idx = open_index(&cfg).await?;
            let count = ingest::rebuild_from_disk(&cfg, &idx).await?;
            println!("Reindexed {count} notes.");
        }
        Commands::Entities { kind, json } => {
            let idx = open_index(&cfg).await?;
            let entities = idx.list_entities(kind.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entities)?);
            } else if entities.is_empty() {
                println!("No entities tracked.");
            } else {
                for entity in &entities {
                    println!(
                        "{:<24} {:>4}  {} .. {}",
                        entity.name,
                        entity.mention_count,
                        format_date(entity.first_seen),
                        format_date(entity.last_seen)
                    );
                }
            }
        }
        Commands::Stats { json } => {
            let idx = open_index(&cfg).await?;
            let stats = idx.stats().await?;
            let db_path = cfg.index_db_path();
            let db_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
            if json {
                let mut value = serde_json::to_value(&stats)?;
                value["db_size_bytes"] = serde_json::Value::from(db_bytes);
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Notes: {}", stats.note_count);
                println!("People: {}", stats.entity_count);
                match stats.last_indexed_at {
                    Some(ts) => println!("Last indexed: {}", format_datetime(ts)),
                    None => println!("Last indexed: never"),
                }
                println!("Database: {} ({} KiB)", db_path.display(), db_bytes / 1024);
            }
        }
    }

    Ok(())
}

/// Open the index database, applying migrations so every command works on
/// a fresh file without an explicit `init`.
async fn open_index(cfg: &config::Config) -> anyhow::Result<index::NoteIndex> {
    let pool = db::connect(cfg).await?;
    migrate::run_migrations(&pool).await?;
    Ok(index::NoteIndex::new(pool, cfg.retrieval.snippet_width))
}

async fn index_one(
    cfg: &config::Config,
    idx: &index::NoteIndex,
    path: &Path,
    full: bool,
) -> anyhow::Result<()> {
    if !parse::is_note_path(path, &cfg.notes.extension) {
        anyhow::bail!(
            "not a note file: {} (expected a YYYY-MM-DD.{} name)",
            path.display(),
            cfg.notes.extension
        );
    }
    match ingest::ingest_file(cfg, idx, path, full).await? {
        ingest::IngestOutcome::Indexed => println!("Indexed {}", path.display()),
        ingest::IngestOutcome::Unchanged => println!("Unchanged: {}", path.display()),
        ingest::IngestOutcome::Missing => anyhow::bail!("no such file: {}", path.display()),
    }
    Ok(())
}

fn format_date(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn format_datetime(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn print_hits(hits: &[models::SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {} / {}", i + 1, hit.score, hit.id, hit.title);
        println!("    category: {}", hit.category);
        if !hit.tags.is_empty() {
            let tags: Vec<String> = hit.tags.iter().map(|t| format!("#{t}")).collect();
            println!("    tags: {}", tags.join(" "));
        }
        if !hit.mentions.is_empty() {
            let mentions: Vec<String> = hit.mentions.iter().map(|m| format!("@{m}")).collect();
            println!("    mentions: {}", mentions.join(" "));
        }
        println!("    updated: {}", format_datetime(hit.updated_at));
        println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " "));
        println!();
    }
}

fn print_note(note: &models::Note) {
    println!("id: {}", note.id);
    println!("path: {}", note.path.display());
    println!("title: {}", note.title);
    println!("category: {}", note.category);
    if !note.tags.is_empty() {
        println!("tags: {}", note.tags.join(", "));
    }
    if !note.mentions.is_empty() {
        println!("mentions: {}", note.mentions.join(", "));
    }
    println!("created: {}", format_datetime(note.created_at));
    println!("updated: {}", format_datetime(note.updated_at));
    println!();
    println!("{}", note.body);
}
