//! # Lore Harness CLI (`lore`)
//!
//! The `lore` binary drives the normalization pipeline, index generation,
//! search, remote sync and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! lore --config ./config/lore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lore normalize <category>` | Normalize raw documents into entity files |
//! | `lore migrate <category>` | Split legacy documents and leave stubs behind |
//! | `lore index [<category>]` | Regenerate indexes, or print one category's entries |
//! | `lore get <category> <id>` | Print one entity file |
//! | `lore search "<term>"` | Fuzzy search across every index |
//! | `lore related "<name>"` | Crosslinks for a name |
//! | `lore sync push\|pull <category>` | Two-way sync with the remote database |
//! | `lore sync ensure-schema\|validate-schema <category>` | Remote schema maintenance |
//! | `lore watch` | Run the sync scheduler |
//! | `lore serve` | Start the HTTP server |
//!
//! Reports are printed to stdout as JSON. Logs go to stderr; set
//! `RUST_LOG` to change the level.

use clap::{Args, Parser, Subcommand};
use lore_harness::config::{load_config, Config};
use lore_harness::indexing::{build_category_index, generate_master_index};
use lore_harness::migrate::migrate_legacy_layout;
use lore_harness::notion::NotionClient;
use lore_harness::pipeline::{load_synonyms, normalize_category, NormalizeOptions};
use lore_harness::scheduler::{run_cycle, run_scheduler};
use lore_harness::search::{run_related, run_search};
use lore_harness::server::run_server;
use lore_harness::storage::LoreStore;
use lore_harness::sync::{ensure_schema, pull, push, validate_schema, SyncError, SyncLocks, SyncTarget};
use lore_harness_core::remote::RemoteStore;
use lore_harness_core::Category;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::prelude::*;

/// Lore Harness CLI: normalize, index, search, and sync worldbuilding lore.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lore.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lore",
    about = "Lore Harness: normalize, index, search, and sync worldbuilding lore",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize raw documents of a category.
    ///
    /// Writes one canonical file per entity under `<category>/formatted/`
    /// and refreshes `formatted/_index.json`. Unreadable, invalid and
    /// migrated files are skipped and listed in the report.
    Normalize {
        /// characters, creatures, realms, plots, or magic.
        category: Category,

        /// Raw file to read instead of the whole category directory.
        #[arg(long = "input")]
        inputs: Vec<PathBuf>,

        /// Also write every entity into one combined document.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Report what would be written without touching the tree.
        #[arg(long)]
        dry_run: bool,
    },

    /// Split legacy multi-entity documents into formatted files.
    ///
    /// Originals are archived under `<category>/archive/` and replaced with
    /// a `_migrated` stub. Running it again is a no-op.
    Migrate {
        category: Category,

        #[arg(long)]
        dry_run: bool,
    },

    /// Regenerate every category index, the master index, and the creature
    /// region bundles. With a category, print that category's entries only.
    Index { category: Option<Category> },

    /// Print an entity file by id.
    Get { category: Category, id: String },

    /// Fuzzy search names, ids, and key fields across all indexes.
    Search { term: String },

    /// Show where a name appears across categories.
    Related { name: String },

    /// Sync with the remote database.
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },

    /// Run the sync scheduler until Ctrl-C.
    Watch {
        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,
    },

    /// Start the HTTP server.
    Serve {
        /// Also run the sync scheduler in the same process.
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Create or update a remote page for every formatted entity.
    Push(SyncArgs),
    /// Merge remote pages into local entity files.
    Pull(SyncArgs),
    /// Add mapped properties missing from the remote schema.
    EnsureSchema(SyncArgs),
    /// Compare the field mapping with the remote schema without changing it.
    ValidateSchema(SyncArgs),
}

#[derive(Args)]
struct SyncArgs {
    category: Category,

    /// Field mapping file. Defaults to `<mappings.dir>/<category>.json`.
    #[arg(long)]
    mapping: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let store = LoreStore::from_config(&cfg);

    match cli.command {
        Commands::Normalize {
            category,
            inputs,
            output,
            dry_run,
        } => {
            let synonyms = load_synonyms(&cfg, category)?;
            let options = NormalizeOptions {
                inputs,
                output,
                dry_run,
            };
            print_json(&normalize_category(&store, category, &synonyms, &options)?)?;
        }
        Commands::Migrate { category, dry_run } => {
            let synonyms = load_synonyms(&cfg, category)?;
            print_json(&migrate_legacy_layout(&store, category, &synonyms, dry_run)?)?;
        }
        Commands::Index { category: Some(category) } => {
            print_json(&build_category_index(&store, category)?)?;
        }
        Commands::Index { category: None } => {
            print_json(&generate_master_index(&store)?)?;
        }
        Commands::Get { category, id } => match store.read_entity(category, &id)? {
            Some((_, doc)) => print_json(&doc)?,
            None => anyhow::bail!("No {} entity with id: {}", category, id),
        },
        Commands::Search { term } => {
            print_json(&run_search(&store, &term)?)?;
        }
        Commands::Related { name } => {
            print_json(&run_related(&store, &name)?)?;
        }
        Commands::Sync { action } => {
            if let Err(e) = run_sync_action(&cfg, &store, action).await {
                print_json(&serde_json::json!({
                    "error": { "code": e.code(), "message": e.to_string() }
                }))?;
                std::process::exit(1);
            }
        }
        Commands::Watch { once } => {
            let remote: Arc<dyn RemoteStore> = Arc::new(NotionClient::from_config(&cfg.remote)?);
            if once {
                let report = run_cycle(&cfg, &store, remote.as_ref(), &SyncLocks::new()).await;
                print_json(&report)?;
            } else {
                let (tx, rx) = watch::channel(false);
                let scheduler = tokio::spawn(run_scheduler(Arc::new(cfg), remote, SyncLocks::new(), rx));
                tokio::signal::ctrl_c().await?;
                let _ = tx.send(true);
                scheduler.await??;
            }
        }
        Commands::Serve { watch } => {
            run_server(cfg, watch).await?;
        }
    }

    Ok(())
}

async fn run_sync_action(cfg: &Config, store: &LoreStore, action: SyncAction) -> Result<(), SyncError> {
    let args = match &action {
        SyncAction::Push(args)
        | SyncAction::Pull(args)
        | SyncAction::EnsureSchema(args)
        | SyncAction::ValidateSchema(args) => args,
    };
    let target = SyncTarget::resolve(cfg, args.category, args.mapping.as_deref())?;
    let client = NotionClient::from_config(&cfg.remote)?;
    let locks = SyncLocks::new();

    let printed = match action {
        SyncAction::Push(_) => print_json(&push(store, &client, &target, &locks).await?),
        SyncAction::Pull(_) => print_json(&pull(store, &client, &target, &locks).await?),
        SyncAction::EnsureSchema(_) => print_json(&ensure_schema(&client, &target).await?),
        SyncAction::ValidateSchema(_) => print_json(&validate_schema(&client, &target).await?),
    };
    printed.map_err(SyncError::Local)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
