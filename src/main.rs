//! Tessera main entry point
//!
//! This is the command-line interface for the Tessera site-text harvester.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tessera::config::{effective_concurrency, load_config_with_hash, normalize_region, Config};
use tessera::crawler::{crawl_single, run_crawl, Outcome, RunOptions};
use tessera::output::{load_statistics, print_run_summary, print_statistics};
use tessera::storage::{SqliteStorage, TargetStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Tessera: a resumable bulk site-text harvester
///
/// Tessera fetches the landing page of every target in its database that has
/// not been fetched successfully yet, extracts the readable text and records
/// either the text or a classified error. Interrupted runs resume where they
/// stopped.
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(version)]
#[command(about = "A resumable bulk site-text harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "tessera.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the number of concurrent fetches
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Only process targets with this country code
    #[arg(long, value_name = "CODE")]
    region: Option<String>,

    /// Validate config and show how many targets would be fetched
    #[arg(long, conflicts_with_all = ["stats", "retry_errors", "target"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "retry_errors", "target"])]
    stats: bool,

    /// Reset errored targets to pending so the next run retries them
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "target"])]
    retry_errors: bool,

    /// Fetch a single target by ID, regardless of its status
    #[arg(long, value_name = "ID", conflicts_with_all = ["dry_run", "stats", "retry_errors"])]
    target: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let region = cli
        .region
        .as_deref()
        .or(config.crawler.region.as_deref())
        .map(normalize_region)
        .transpose()
        .context("Invalid --region")?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, cli.concurrency, region.as_deref())
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.retry_errors {
        handle_retry_errors(&config, region.as_deref())
    } else if let Some(target_id) = cli.target {
        handle_single(config, target_id).await
    } else {
        let options = RunOptions {
            concurrency: cli.concurrency,
            region,
            config_hash,
            cancel: CancellationToken::new(),
        };
        handle_crawl(config, options).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tessera=info,warn"),
            1 => EnvFilter::new("tessera=debug,info"),
            2 => EnvFilter::new("tessera=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    SqliteStorage::new(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles the --dry-run mode: validates config and counts pending targets
fn handle_dry_run(
    config: &Config,
    concurrency: Option<usize>,
    region: Option<&str>,
) -> anyhow::Result<()> {
    let concurrency =
        effective_concurrency(config, concurrency).context("Invalid --concurrency")?;

    println!("=== Tessera Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency: {}", concurrency);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.crawler.request_timeout_secs, config.crawler.connect_timeout_secs
    );
    println!("  Minimum content: {} chars", config.crawler.min_content_chars);
    if config.crawler.max_run_secs > 0 {
        println!("  Run deadline: {}s", config.crawler.max_run_secs);
    }

    println!("\nPersistence:");
    println!("  Flush every: {} outcomes", config.persistence.flush_threshold);
    println!(
        "  Final flush attempts: {}",
        config.persistence.final_flush_attempts
    );
    println!("  Database: {}", config.storage.database_path);

    let storage = open_database(config)?;
    let pending = storage.list_pending_targets(region)?;

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would fetch {} target(s){}",
        pending.len(),
        region.map(|r| format!(" in region {}", r)).unwrap_or_default()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --retry-errors mode: puts errored targets back in the queue
fn handle_retry_errors(config: &Config, region: Option<&str>) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    let reset = storage.reset_errors(region)?;

    tracing::info!("Reset {} errored target(s) to pending", reset);
    println!("✓ {} target(s) will be retried on the next run", reset);

    Ok(())
}

/// Handles the --target mode: fetches one target immediately
async fn handle_single(config: Config, target_id: i64) -> anyhow::Result<()> {
    let outcome = crawl_single(config, target_id)
        .await
        .with_context(|| format!("Failed to crawl target {}", target_id))?;

    match outcome {
        Outcome::Success { text, .. } => {
            println!(
                "✓ Target {} fetched ({} chars of text)",
                target_id,
                text.chars().count()
            );
        }
        Outcome::Failed { kind, detail, .. } => {
            println!("✗ Target {} failed: {} ({})", target_id, kind, detail);
        }
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, options: RunOptions) -> anyhow::Result<()> {
    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            cancel.cancel();
        }
    });

    match run_crawl(config, options).await {
        Ok(summary) => {
            print_run_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
