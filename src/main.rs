//! Report-Harvest main entry point
//!
//! This is the command-line interface for the Report-Harvest harvester.

use anyhow::Context;
use clap::Parser;
use report_harvest::config::{load_config_with_hash, Config};
use report_harvest::harvest::{
    run_pipeline, HttpJsonSource, ItemRef, ListingSource, PipelineOptions, ResumeOptions,
    StartOverride, TracingReporter,
};
use report_harvest::output::{
    load_statistics, print_statistics, JsonLinesWriter, StorageSink, TeeSink,
};
use report_harvest::storage::{SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Report-Harvest: a resumable, rate-limited report harvester
///
/// Report-Harvest walks a paginated listing, fetches every report it has not
/// stored yet in small groups, and prints each one as a JSON line. When a run
/// fails, the next run resumes at the report that broke it.
#[derive(Parser, Debug)]
#[command(name = "report-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, rate-limited report harvester", long_about = None)]
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

    /// Page number to start from, overriding any stored checkpoint
    #[arg(long, value_name = "N", requires = "start_item")]
    start_page: Option<u32>,

    /// Report to start from (inclusive), given with --start-page
    #[arg(long, value_name = "URI", requires = "start_page")]
    start_item: Option<String>,

    /// Discard the stored checkpoint and start from the configured page
    #[arg(long, conflicts_with = "start_page")]
    ignore_checkpoint: bool,

    /// Validate config and show where the harvest would start without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(config, config_hash, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr, stdout carries the harvested reports.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("report_harvest=info,warn"),
            1 => EnvFilter::new("report_harvest=debug,info"),
            2 => EnvFilter::new("report_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn resume_options(cli: &Cli, source: &HttpJsonSource) -> ResumeOptions {
    let explicit = match (cli.start_page, &cli.start_item) {
        (Some(page), Some(item)) => Some(StartOverride {
            page: source.page_of(page),
            item: ItemRef::from(item.as_str()),
        }),
        _ => None,
    };

    ResumeOptions {
        explicit,
        ignore_checkpoint: cli.ignore_checkpoint,
    }
}

/// Handles the --dry-run mode: validates config and shows where the harvest would start
fn handle_dry_run(config: &Config, cli: &Cli) -> anyhow::Result<()> {
    println!("=== Report-Harvest Dry Run ===\n");

    println!("Harvest Configuration:");
    println!("  Group size: {}", config.harvest.group_size);
    println!("  Group interval: {}ms", config.harvest.group_interval_ms);
    println!(
        "  Already persisted limit: {}",
        config.harvest.already_persisted_limit
    );
    if let Some(stop) = &config.harvest.stop_before {
        println!("  Stop before: {}", stop);
    }

    println!("\nSource:");
    println!("  Index URL: {}", config.source.index_url);
    println!("  Items field: {}", config.source.items_field);
    println!("  Total pages field: {}", config.source.total_pages_field);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let source = HttpJsonSource::from_config(config)?;
    let options = resume_options(cli, &source);

    // Only peek at the checkpoint: a dry run must not consume it
    let (page, item) = if let Some(explicit) = &options.explicit {
        (explicit.page.to_string(), Some(explicit.item.to_string()))
    } else {
        let database = Path::new(&config.output.database_path);
        let checkpoint = if options.ignore_checkpoint || !database.exists() {
            None
        } else {
            SqliteStorage::new(database)?.get_checkpoint()?
        };
        match checkpoint {
            Some(checkpoint) => (
                checkpoint.page_ref.to_string(),
                checkpoint.item_ref.map(|item| item.to_string()),
            ),
            None => (
                source.page_of(config.harvest.start_page).to_string(),
                config.harvest.resume_from.clone(),
            ),
        }
    };

    println!("\n✓ Configuration is valid");
    println!("✓ Would start harvesting at {}", page);
    if let Some(item) = item {
        println!("✓ Would resume from report {}", item);
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String, cli: &Cli) -> anyhow::Result<()> {
    let source = Arc::new(HttpJsonSource::from_config(&config)?);
    let storage = Arc::new(Mutex::new(SqliteStorage::new(Path::new(
        &config.output.database_path,
    ))?));

    let options = PipelineOptions {
        resume: resume_options(cli, &source),
        config_hash,
    };

    let stdout = std::io::stdout();
    let mut sink = TeeSink::new(
        StorageSink::new(storage.clone()),
        JsonLinesWriter::new(stdout.lock()),
    );

    let summary = match run_pipeline(
        source,
        storage,
        &config.harvest,
        &options,
        &mut sink,
        Arc::new(TracingReporter),
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!(
        "Harvest completed: {} reports from page {} to {} ({} already stored)",
        summary.delivered,
        summary.start.page_number,
        summary.last_page,
        summary.already_persisted
    );
    Ok(())
}
