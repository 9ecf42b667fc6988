//! Range-Sweep main entry point
//!
//! This is the command-line interface for the Range-Sweep identifier crawler.

use anyhow::{Context, Result};
use clap::Parser;
use range_sweep::config::{apply_overrides, load_config_with_hash, Config, Overrides};
use range_sweep::crawler::{Coordinator, RunSummary};
use range_sweep::output::{
    load_statistics, print_category_tree, print_record_page, print_statistics,
};
use range_sweep::state::CancelFlag;
use range_sweep::storage::{open_storage, CategoryPath, RecordQuery, Storage};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Range-Sweep: a resumable identifier-space crawler
///
/// Range-Sweep visits every identifier of a numeric range on a document
/// mirror, classifies each response and stores the results in SQLite.
/// Interrupted runs continue from the furthest persisted identifier.
#[derive(Parser, Debug)]
#[command(name = "range-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A resumable identifier-space crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard all persisted records, tombstones and runs before starting
    #[arg(long)]
    clean: bool,

    /// First identifier to visit (overrides start-id)
    #[arg(long, allow_hyphen_values = true)]
    start: Option<i64>,

    /// Last identifier to visit (overrides end-id)
    #[arg(long, allow_hyphen_values = true)]
    end: Option<i64>,

    /// Identifiers fetched concurrently per batch (overrides workers)
    #[arg(long)]
    workers: Option<u32>,

    /// Consecutive failures that stop the run, 0 disables (overrides fail-limit)
    #[arg(long)]
    fail_limit: Option<u32>,

    /// Mirror link to derive the request template from (overrides url-template)
    #[arg(long)]
    mirror: Option<String>,

    /// Validate config and show where a run would start without crawling
    #[arg(long, conflicts_with_all = ["stats", "list", "categories", "retry_errors"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "list", "categories", "retry_errors"])]
    stats: bool,

    /// List stored records one page at a time and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "categories", "retry_errors"])]
    list: bool,

    /// Substring matched against titles and identifiers (with --list)
    #[arg(long, requires = "list")]
    search: Option<String>,

    /// Category path such as "Video > HD" (with --list)
    #[arg(long, requires = "list")]
    category: Option<String>,

    /// Page number (with --list)
    #[arg(long, requires = "list", default_value_t = 1)]
    page: u32,

    /// Show the category tree and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "list", "retry_errors"])]
    categories: bool,

    /// Re-fetch identifiers whose last fetch failed at the transport level
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "list", "categories"])]
    retry_errors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let overrides = Overrides {
        start_id: cli.start,
        end_id: cli.end,
        workers: cli.workers,
        fail_limit: cli.fail_limit,
        mirror: cli.mirror.clone(),
    };
    let config = apply_overrides(config, &overrides).context("Invalid command-line override")?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &config_hash, cli.clean)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.list {
        handle_list(&config, &cli)
    } else if cli.categories {
        handle_categories(&config)
    } else {
        handle_crawl(&config, &config_hash, cli.clean, cli.retry_errors).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("range_sweep=info,warn"),
            1 => EnvFilter::new("range_sweep=debug,info"),
            2 => EnvFilter::new("range_sweep=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows where the run would start
fn handle_dry_run(config: &Config, config_hash: &str, clean: bool) -> Result<()> {
    println!("=== Range-Sweep Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Range: {} -> {} ({})", crawler.start_id, crawler.end_id, config.direction());
    println!("  Workers: {}", crawler.workers);
    println!("  Fail limit: {}", crawler.fail_limit);
    println!("  Transport errors: {:?}", crawler.transport_errors);

    let template = config.fetch.template()?;
    println!("\nFetch:");
    println!("  Template: {}", template);
    println!("  User-Agent: {}", config.fetch.user_agent);
    println!("  Timeout: {}s", config.fetch.timeout_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Size limit: {} bytes", config.output.max_database_bytes);

    println!("\n✓ Configuration is valid (hash: {})", config_hash);

    if clean {
        println!("✓ Would discard existing data and start at {}", crawler.start_id);
    } else {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        let pointer = range_sweep::crawler::resume_pointer(
            crawler.start_id,
            storage.resume_point(config.direction())?,
            config.direction(),
        );
        match pointer {
            Some(pointer) => println!("✓ Would start at {}", pointer),
            None => println!("✓ Nothing left to visit"),
        }
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --list mode: prints one page of stored records
fn handle_list(config: &Config, cli: &Cli) -> Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;

    let category = cli.category.as_deref().map(CategoryPath::parse);
    let query = RecordQuery {
        search: cli.search.clone(),
        category: category.clone(),
        page: cli.page,
        ..RecordQuery::default()
    };

    let page = storage.list_records(&query)?;
    print_record_page(&page, category.as_ref());

    Ok(())
}

/// Handles the --categories mode: prints the category tree
fn handle_categories(config: &Config) -> Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    print_category_tree(&storage.category_tree()?);
    Ok(())
}

/// Handles the main crawl operation (or an error retry pass)
async fn handle_crawl(config: &Config, config_hash: &str, clean: bool, retry: bool) -> Result<()> {
    if clean {
        tracing::info!("Starting clean run (discarding previous state)");
    }

    let cancel = CancelFlag::new();
    install_interrupt_handler(cancel.clone());

    let mut coordinator = Coordinator::new(config, config_hash, clean)
        .context("Failed to initialize the run")?
        .with_cancel_flag(cancel);

    let summary: RunSummary = if retry {
        coordinator.retry_errors().await
    } else {
        coordinator.run().await
    }
    .context("Run failed")?;

    println!(
        "\n[*] Run {} stopped ({}). {} live records. Data saved to {}.",
        summary.run_id, summary.reason, summary.live_count, config.output.database_path
    );

    Ok(())
}

/// First Ctrl+C cancels at the next batch boundary. Second Ctrl+C exits immediately.
fn install_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current batch");
            tracing::warn!("Press Ctrl+C again to force quit");
            cancel.request();

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nForce quit requested, exiting immediately...");
                std::process::exit(1);
            }
        }
    });
}
