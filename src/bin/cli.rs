//! gongo crawler CLI
//!
//! Local execution entry point for sweeps, manual triggers, and
//! procedure provisioning.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gongo::{
    config,
    error::{AppError, Result},
    models::RunStatus,
    pipeline::{BoardOutcome, Orchestrator},
    services::{PatternProvider, ProcedureProvider},
    storage::{LocalStore, PostingStore},
    utils::http::{HttpFetcher, PageFetcher},
};

/// gongo - Public-Office Job Board Crawler
#[derive(Parser, Debug)]
#[command(name = "gongo", version, about = "Public-office job board crawler")]
struct Cli {
    /// Path to storage directory containing config files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all due boards, bounded by the concurrency limit
    Sweep,

    /// Run one board now
    Crawl {
        /// Board id from the registry
        #[arg(long)]
        board: String,
    },

    /// Derive and persist an extraction procedure for a board
    Provision {
        /// Board id from the registry
        #[arg(long)]
        board: String,

        /// Re-provision even if the board already has a procedure
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration and board registry
    Validate,

    /// Show store and run summary per board
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (config, mut registry) = config::load_all(&cli.storage_dir)?;
    log::info!(
        "Loaded {} boards from {}",
        registry.boards().len(),
        cli.storage_dir.display()
    );

    let config = Arc::new(config);
    let fetcher = Arc::new(HttpFetcher::new(&config.crawler)?);
    let store = Arc::new(LocalStore::new(&cli.storage_dir));
    let provider = Arc::new(PatternProvider::new());

    match cli.command {
        Command::Sweep => {
            let orchestrator = Orchestrator::new(
                Arc::clone(&config),
                fetcher,
                Arc::clone(&store) as Arc<dyn PostingStore>,
                provider,
            );
            let summary = orchestrator.sweep(registry.boards()).await;

            for outcome in &summary.outcomes {
                match outcome {
                    BoardOutcome::Ran(run) => log::info!(
                        "  {}: {:?} (+{} ~{} ={} !{})",
                        run.board_id,
                        run.status,
                        run.counts.inserted,
                        run.counts.updated,
                        run.counts.unchanged,
                        run.counts.skipped
                    ),
                    BoardOutcome::ProcedureMissing { board_id } => {
                        log::warn!("  {}: procedure missing, needs provisioning", board_id)
                    }
                    BoardOutcome::AlreadyRunning { board_id } => {
                        log::warn!("  {}: already running", board_id)
                    }
                    BoardOutcome::NotDue { board_id } => {
                        log::debug!("  {}: not due", board_id)
                    }
                }
            }
        }

        Command::Crawl { board } => {
            let board = registry
                .get(&board)
                .cloned()
                .ok_or_else(|| AppError::config(format!("Unknown board '{board}'")))?;

            let orchestrator = Orchestrator::new(
                Arc::clone(&config),
                fetcher,
                Arc::clone(&store) as Arc<dyn PostingStore>,
                provider,
            );
            let run = orchestrator.trigger(&board).await?;

            log::info!("Run {} finished: {:?}", run.id, run.status);
            if let Some(error) = &run.error {
                log::warn!("  detail: {}", error);
            }
            log::info!(
                "  {} discovered, {} inserted, {} updated, {} unchanged, {} skipped",
                run.counts.discovered,
                run.counts.inserted,
                run.counts.updated,
                run.counts.unchanged,
                run.counts.skipped
            );

            if run.status == RunStatus::Failed {
                std::process::exit(1);
            }
        }

        Command::Provision { board, force } => {
            let target = registry
                .get(&board)
                .cloned()
                .ok_or_else(|| AppError::config(format!("Unknown board '{board}'")))?;

            if target.procedure.is_some() && !force {
                log::warn!(
                    "Board '{}' already has a procedure (version {}). Use --force to replace.",
                    board,
                    target.procedure.as_ref().map(|p| p.version).unwrap_or(0)
                );
                return Ok(());
            }

            let sample = fetcher.fetch(&target.list_url(1)).await?;
            let procedure = provider.provision(&target, &sample).await?;
            log::info!(
                "Provisioned board '{}' with procedure version {}",
                board,
                procedure.version
            );

            // Replaced wholesale in the registry, never patched.
            registry
                .get_mut(&board)
                .expect("board disappeared from registry")
                .set_procedure(procedure);
            registry.save(config::registry_path(&cli.storage_dir))?;
            log::info!("Registry saved");
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            registry.validate()?;

            let without_procedure: Vec<_> = registry
                .boards()
                .iter()
                .filter(|b| b.active && b.procedure.is_none())
                .map(|b| b.id.as_str())
                .collect();
            if !without_procedure.is_empty() {
                log::warn!(
                    "Active boards without a procedure: {}",
                    without_procedure.join(", ")
                );
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            for board in registry.boards() {
                let postings = store.list_postings(&board.id).await?;
                let last = store.last_completed_run(&board.id).await?;

                match last {
                    Some(run) => log::info!(
                        "{}: {} postings, last run {:?} at {}",
                        board.id,
                        postings.len(),
                        run.status,
                        run.completed_at
                            .map(|at| at.to_rfc3339())
                            .unwrap_or_default()
                    ),
                    None => log::info!("{}: {} postings, never crawled", board.id, postings.len()),
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
