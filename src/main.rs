//! # twindex CLI
//!
//! The `twindex` binary drives the ingestion pipeline. It provides
//! commands for registry initialization, incremental sync, extraction
//! dispatch, completion delivery, retry, chunking, and reconciliation.
//!
//! ## Usage
//!
//! ```bash
//! twindex --config ./config/twindex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `twindex init` | Create the SQLite registry and run schema migrations |
//! | `twindex sync <partition|all>` | Pull the change feed and mirror raw objects |
//! | `twindex dispatch <key>` | Route one stored document to extraction |
//! | `twindex dispatch --pending` | Route every `pending` document |
//! | `twindex complete <job_id>` | Deliver an analysis-job completion |
//! | `twindex retry` | Re-dispatch every `failed` document |
//! | `twindex chunk <key>` | Chunk a finished twin (optionally to JSONL) |
//! | `twindex stats` | Registry and cursor overview |
//! | `twindex reconcile` | Compare raw objects, twins, and registry |

mod analysis;
mod chunker;
mod config;
mod cursor;
mod db;
mod error;
mod extract;
mod migrate;
mod models;
mod paths;
mod reconcile;
mod registry;
mod router;
mod source;
mod stats;
mod store;
mod tracker;
mod twin;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::analysis::{AnalysisService, HttpAnalysisService};
use crate::config::Config;
use crate::cursor::CursorStore;
use crate::models::DocStatus;
use crate::registry::Registry;
use crate::router::{CompletionOutcome, ExtractionRouter, RoutingOutcome};
use crate::source::HttpChangeSource;
use crate::store::{FsObjectStore, ObjectStore};
use crate::tracker::ChangeTracker;

/// twindex — coordinate ingestion of a remote document corpus into
/// structured digital twins.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/twindex.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "twindex",
    about = "Mirror a remote document corpus into structured digital twins",
    version,
    long_about = "twindex tracks a remote content source partition by partition, mirrors raw \
    documents into an object store, routes each one through the right extraction path \
    (asynchronous OCR/layout analysis or synchronous in-process extraction), and assembles \
    normalized JSON twins plus overlapping retrieval chunks."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/twindex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the registry database schema.
    ///
    /// Creates the SQLite file and the documents/cursors tables.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Pull the change feed for one partition (or `all`).
    ///
    /// Applies created/updated/deleted records to the object store and
    /// registry, then advances the partition's sync cursor. A partition
    /// with no stored cursor gets a full listing.
    Sync {
        /// Partition id, or `all` for every configured partition.
        partition: String,

        /// Drop the stored cursor first — force a full listing.
        #[arg(long)]
        full: bool,
    },

    /// Route stored documents into their extraction paths.
    ///
    /// Also the re-dispatch entry point for reconciliation: storage
    /// notifications are best-effort, so any key can be (re)driven here.
    Dispatch {
        /// Storage key of one document to dispatch.
        key: Option<String>,

        /// Dispatch every document currently in `pending`.
        #[arg(long)]
        pending: bool,
    },

    /// Deliver the completion signal for an analysis job.
    ///
    /// Idempotent: duplicate and stale completions are discarded.
    Complete {
        /// Job id from the analysis service's completion notification.
        job_id: String,
    },

    /// Re-dispatch every `failed` document.
    Retry,

    /// Chunk a finished twin for retrieval indexing.
    Chunk {
        /// Storage key of the source document (not the twin).
        key: String,

        /// Write chunks as JSONL to this path instead of a summary.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show registry counts and sync-cursor health.
    Stats,

    /// Compare raw objects, twins, and the registry; report drift.
    Reconcile {
        /// Re-dispatch documents that are stuck without a twin.
        #[arg(long)]
        dispatch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Init => cmd_init(&config).await,
        Commands::Sync { partition, full } => cmd_sync(&config, &partition, full).await,
        Commands::Dispatch { key, pending } => cmd_dispatch(&config, key.as_deref(), pending).await,
        Commands::Complete { job_id } => cmd_complete(&config, &job_id).await,
        Commands::Retry => cmd_retry(&config).await,
        Commands::Chunk { key, output } => cmd_chunk(&config, &key, output.as_deref()).await,
        Commands::Stats => cmd_stats(&config).await,
        Commands::Reconcile { dispatch } => cmd_reconcile(&config, dispatch).await,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Component wiring
// ═══════════════════════════════════════════════════════════════════════

struct Components {
    registry: Registry,
    cursors: CursorStore,
    store: FsObjectStore,
    analysis: Option<HttpAnalysisService>,
}

impl Components {
    async fn build(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.registry.db_path).await?;
        let analysis = match &config.analysis {
            Some(cfg) => Some(HttpAnalysisService::new(&cfg.base_url, cfg.timeout_secs)?),
            None => None,
        };
        Ok(Self {
            registry: Registry::new(pool.clone()),
            cursors: CursorStore::new(pool),
            store: FsObjectStore::new(config.store.root.clone()),
            analysis,
        })
    }

    fn router<'a>(&'a self, config: &'a Config) -> ExtractionRouter<'a> {
        ExtractionRouter::new(
            &self.registry,
            &self.store,
            self.analysis.as_ref().map(|a| a as &dyn AnalysisService),
            &config.store.source_prefix,
            &config.store.twin_prefix,
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════

async fn cmd_init(config: &Config) -> Result<()> {
    let pool = db::connect(&config.registry.db_path).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("initialized {}", config.registry.db_path.display());
    Ok(())
}

async fn cmd_sync(config: &Config, partition: &str, full: bool) -> Result<()> {
    let components = Components::build(config).await?;
    let source = HttpChangeSource::new(&config.source.base_url, config.source.timeout_secs)?;

    let partitions: Vec<String> = if partition == "all" {
        config.source.partitions.clone()
    } else {
        if !config.source.partitions.iter().any(|p| p == partition) {
            bail!(
                "Unknown partition '{}'. Configured: {}",
                partition,
                config.source.partitions.join(", ")
            );
        }
        vec![partition.to_string()]
    };

    let tracker = ChangeTracker::new(
        &source,
        &components.store,
        &components.registry,
        &components.cursors,
        &config.source,
        &config.store.source_prefix,
        &config.store.twin_prefix,
    );

    for partition in &partitions {
        if full {
            components.cursors.reset(partition).await?;
        }
        let report = tracker
            .sync(partition)
            .await
            .with_context(|| format!("sync failed for partition '{}'", partition))?;

        println!("sync {}", partition);
        println!("  items seen: {}", report.items_seen);
        println!("  created: {}", report.created);
        println!("  updated: {}", report.updated);
        println!("  unchanged: {}", report.unchanged);
        println!("  deleted: {}", report.deleted);
        println!("  excluded: {}", report.excluded);
        if report.errors > 0 {
            println!("  errors: {}", report.errors);
        }
    }
    println!("ok");
    Ok(())
}

async fn cmd_dispatch(config: &Config, key: Option<&str>, pending: bool) -> Result<()> {
    let components = Components::build(config).await?;
    let router = components.router(config);

    let keys: Vec<String> = match (key, pending) {
        (Some(key), false) => vec![key.to_string()],
        (None, true) => components
            .registry
            .by_status(DocStatus::Pending)
            .await?
            .into_iter()
            .map(|r| r.storage_key)
            .collect(),
        _ => bail!("Pass a storage key or --pending (not both)"),
    };

    let mut counts = (0u64, 0u64, 0u64, 0u64); // submitted, extracted, failed, skipped
    for key in &keys {
        match router.dispatch(key).await? {
            RoutingOutcome::Submitted { job_id } => {
                counts.0 += 1;
                println!("submitted {} (job {})", key, job_id);
            }
            RoutingOutcome::Extracted { twin_key } => {
                counts.1 += 1;
                println!("extracted {} -> {}", key, twin_key);
            }
            RoutingOutcome::Failed { reason } => {
                counts.2 += 1;
                println!("failed {} ({})", key, reason);
            }
            RoutingOutcome::Skipped { reason } => {
                counts.3 += 1;
                println!("skipped {} ({})", key, reason);
            }
        }
    }
    println!(
        "dispatch: {} submitted, {} extracted, {} failed, {} skipped",
        counts.0, counts.1, counts.2, counts.3
    );
    Ok(())
}

async fn cmd_complete(config: &Config, job_id: &str) -> Result<()> {
    let components = Components::build(config).await?;
    let router = components.router(config);

    match router.complete(job_id).await? {
        CompletionOutcome::Completed { twin_key } => {
            println!("completed {} -> {}", job_id, twin_key)
        }
        CompletionOutcome::Failed { reason } => println!("failed {} ({})", job_id, reason),
        CompletionOutcome::Discarded { reason } => println!("discarded {} ({})", job_id, reason),
    }
    Ok(())
}

async fn cmd_retry(config: &Config) -> Result<()> {
    let components = Components::build(config).await?;
    let router = components.router(config);

    let failed = components.registry.by_status(DocStatus::Failed).await?;
    if failed.is_empty() {
        println!("no failed documents");
        return Ok(());
    }

    let mut retried = 0u64;
    for record in &failed {
        match router.dispatch(&record.storage_key).await {
            Ok(RoutingOutcome::Failed { reason }) => {
                println!("still failing {} ({})", record.storage_key, reason)
            }
            Ok(_) => retried += 1,
            Err(e) => println!("error retrying {}: {}", record.storage_key, e),
        }
    }
    println!("retried {} of {} failed documents", retried, failed.len());
    Ok(())
}

async fn cmd_chunk(config: &Config, key: &str, output: Option<&std::path::Path>) -> Result<()> {
    let components = Components::build(config).await?;

    let twin_key = paths::twin_key(&config.store.source_prefix, &config.store.twin_prefix, key);
    let bytes = components
        .store
        .get(&twin_key)
        .await
        .with_context(|| format!("no twin at {} (has the document been extracted?)", twin_key))?;
    let twin: twin::Twin = serde_json::from_slice(&bytes)
        .with_context(|| format!("twin at {} is not valid JSON", twin_key))?;

    let chunks = chunker::chunk_twin(
        &twin,
        config.chunking.max_chars,
        config.chunking.overlap_chars,
    )?;

    match output {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            let written = chunker::export_jsonl(&chunks, &mut file)?;
            println!("wrote {} chunks to {}", written, path.display());
        }
        None => {
            println!("twin {}", twin_key);
            println!("  document_id: {}", twin.document_id);
            println!("  pages: {}", twin.pages.len());
            println!("  chunks: {}", chunks.len());
            for chunk in chunks.iter().take(3) {
                let preview: String = chunk.text.chars().take(60).collect();
                println!("    [{}] {:?} {}", chunk.chunk_index, chunk.metadata.page_numbers, preview);
            }
        }
    }
    Ok(())
}

async fn cmd_stats(config: &Config) -> Result<()> {
    let components = Components::build(config).await?;
    stats::run_stats(&components.registry, &components.cursors).await
}

async fn cmd_reconcile(config: &Config, dispatch: bool) -> Result<()> {
    let components = Components::build(config).await?;
    let router = components.router(config);

    let report = reconcile::reconcile(
        &components.store,
        &components.registry,
        &router,
        &config.store.source_prefix,
        &config.store.twin_prefix,
        dispatch,
    )
    .await?;

    println!("reconcile");
    println!("  raw objects: {}", report.raw_objects);
    println!("  twin objects: {}", report.twin_objects);
    println!("  unregistered raw objects: {}", report.unregistered.len());
    for key in report.unregistered.iter().take(10) {
        println!("    {}", key);
    }
    println!("  documents missing a twin: {}", report.missing_twin.len());
    for key in report.missing_twin.iter().take(10) {
        println!("    {}", key);
    }
    println!("  orphan twins: {}", report.orphan_twins.len());
    for key in report.orphan_twins.iter().take(10) {
        println!("    {}", key);
    }
    if dispatch {
        println!("  re-dispatched: {}", report.redispatched);
    }
    Ok(())
}
