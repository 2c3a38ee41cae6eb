//! Listing-Harvest main entry point
//!
//! This is the command-line interface for the Listing-Harvest classifieds crawler.

use clap::Parser;
use listing_harvest::config::{load_config_with_hash, Config};
use listing_harvest::crawler::run_crawl;
use listing_harvest::output::{load_statistics, print_statistics};
use listing_harvest::storage::{open_storage, CrawlTarget, ListingStore};
use listing_harvest::url::search_url;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Listing-Harvest: a classifieds crawler driven through a rendering proxy
///
/// Listing-Harvest fetches search result pages for every registered
/// (area, search term) target through a rendering proxy, extracts the
/// listings embedded in each page, and stores them in SQLite.
#[derive(Parser, Debug)]
#[command(name = "listing-harvest")]
#[command(version)]
#[command(about = "A classifieds crawler driven through a rendering proxy", long_about = None)]
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

    /// Crawl at most N targets (overrides crawler.target-limit)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    limit: Option<u32>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "add_target"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "add_target"])]
    stats: bool,

    /// Register a crawl target and exit
    #[arg(
        long,
        num_args = 2,
        value_names = ["AREA", "QUERY"],
        conflicts_with_all = ["dry_run", "stats"]
    )]
    add_target: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(limit) = cli.limit {
        config.crawler.target_limit = Some(limit);
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(target) = cli.add_target.as_deref() {
        handle_add_target(&config, target)?;
    } else {
        handle_crawl(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvest=info,warn"),
            1 => EnvFilter::new("listing_harvest=debug,info"),
            2 => EnvFilter::new("listing_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Listing-Harvest Dry Run ===\n");

    println!("Proxy:");
    println!("  Base URL: {}", config.proxy.base_url);
    if !config.proxy.endpoint.is_empty() {
        println!("  Endpoint: {}", config.proxy.endpoint);
    }
    println!("  Method: {}", config.proxy.method);
    println!("  Timeout: {}s", config.proxy.timeout_secs);
    println!(
        "  Token: {}",
        if config.proxy.token.is_some() { "set" } else { "not set" }
    );

    println!("\nDispatcher:");
    println!("  Max concurrent: {}", config.dispatcher.max_concurrent);
    println!("  Transport attempts: {}", config.dispatcher.transport_retries);
    println!("  Validation retries: {}", config.dispatcher.validation_retries);
    println!(
        "  Backoff: {}ms base, {}ms max",
        config.dispatcher.backoff_base_ms, config.dispatcher.backoff_max_ms
    );

    println!("\nCrawler:");
    println!("  Chunk size: {}", config.crawler.chunk_size);
    match config.crawler.target_limit {
        Some(limit) => println!("  Target limit: {}", limit),
        None => println!("  Target limit: none"),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let limit = config.crawler.target_limit.map(|l| l as usize);
    let targets = storage.list_targets(limit)?;

    println!("\nTargets ({}):", targets.len());
    for target in &targets {
        println!("  - {} / {}", target.area_id, target.vacancy_name);
        println!("    * {}", search_url(&config.site, target));
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} seed URLs", targets.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --add-target mode: registers an (area, query) pair
fn handle_add_target(config: &Config, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let [area, query] = args else {
        return Err("--add-target expects AREA and QUERY".into());
    };

    if area.trim().is_empty() || query.trim().is_empty() {
        return Err("AREA and QUERY must not be empty".into());
    }

    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let target = CrawlTarget::new(area.trim(), query.trim());

    if storage.add_target(&target)? {
        println!("✓ Added target {} / {}", target.area_id, target.vacancy_name);
    } else {
        println!(
            "Target {} / {} is already registered",
            target.area_id, target.vacancy_name
        );
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Proxy: {} ({}), max concurrent: {}",
        config.proxy.base_url,
        config.proxy.method,
        config.dispatcher.max_concurrent
    );

    match run_crawl(config, config_hash).await {
        Ok(report) => {
            report.print();
            if report.targets_unavailable {
                tracing::error!("Crawl targets could not be loaded");
            } else if !report.persisted {
                tracing::error!("Collected listings were not stored");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
