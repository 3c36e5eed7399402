//! sitechunk main entry point
//!
//! This is the command-line interface for the sitechunk crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use sitechunk::config::{load_config_with_hash, ScraperConfig};
use sitechunk::output::print_report;
use sitechunk::{Coordinator, RunState};
use tracing_subscriber::EnvFilter;

/// sitechunk: crawl a website into deduplicated text chunks
///
/// sitechunk crawls a site breadth-first from the configured seed URL,
/// splits every page's visible text into chunks and writes each chunk
/// that was not seen before to a CSV file.
#[derive(Parser, Debug)]
#[command(name = "sitechunk")]
#[command(version)]
#[command(about = "Crawl a website into deduplicated text chunks", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Override the configured maximum depth
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Override the output CSV path (relative to the output root)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(state) => ExitCode::from(state.exit_code()),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(RunState::FatalError.exit_code())
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunState> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = Some(depth);
    }
    if let Some(output) = cli.output {
        config.output.path = Some(output);
    }

    if cli.dry_run {
        handle_dry_run(config)?;
        return Ok(RunState::Completed);
    }

    let coordinator = Coordinator::new(config)?;
    tracing::info!("Starting crawl from {}", coordinator.seed());

    let report = coordinator.run().await?;
    if !cli.quiet {
        print_report(&report);
    }
    Ok(report.state)
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence over the flags when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "sitechunk=info,warn",
            1 => "sitechunk=debug,info",
            2 => "sitechunk=trace,debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: ScraperConfig) -> anyhow::Result<()> {
    // Building the coordinator resolves the seed, selector, proxy and output path
    let coordinator = Coordinator::new(config.clone())?;

    println!("=== sitechunk Dry Run ===\n");
    println!("Seed: {}", config.domain);

    println!("\nCrawler:");
    match config.crawler.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unbounded"),
    }
    println!(
        "  Concurrent requests: {}",
        config.crawler.concurrent_requests
    );
    println!(
        "  Connections per host: {}",
        config.crawler.connections_per_host
    );
    println!(
        "  Delay between requests: {}s",
        config.crawler.delay_between_requests
    );

    println!("\nFilter:");
    println!("  Include keywords: {:?}", config.filter.include_keywords);
    println!("  Exclude keywords: {:?}", config.filter.exclude_keywords);
    println!("  Start with: {:?}", config.filter.start_with);
    println!(
        "  Excluded protocols: {:?}",
        config.filter.excluded_protocols
    );
    println!("  Stay on domain: {}", config.filter.stay_on_domain);
    println!(
        "  Block private hosts: {}",
        config.filter.block_private_hosts
    );

    println!("\nHTTP:");
    println!("  Max retries: {}", config.http.max_retries);
    println!("  Base delay: {}s", config.http.base_delay);
    println!("  Max backoff: {}s", config.http.max_backoff);
    println!("  Timeout: {}s", config.http.timeout);
    match &config.http.user_agent {
        Some(agent) => println!("  User agent: {}", agent),
        None => println!("  User agent: rotating"),
    }

    let breaker = &config.circuit_breaker;
    println!("\nCircuit breaker:");
    if breaker.enabled {
        println!("  Consecutive failure threshold: {}", breaker.threshold);
        println!(
            "  Failure rate: {:.0}% after {} requests",
            breaker.failure_rate * 100.0,
            breaker.min_requests
        );
    } else {
        println!("  Disabled");
    }

    println!("\nContent:");
    match config.content.split_length.limit() {
        Some(limit) => println!("  Split length: {} chars", limit),
        None => println!("  Split length: none"),
    }
    if let Some(selector) = &config.content.target_selector {
        println!("  Target selector: {}", selector);
    }

    println!("\nOutput:");
    match coordinator.output_path() {
        Some(path) => println!("  CSV: {}", path.display()),
        None => println!("  CSV: none"),
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling at {}", coordinator.seed());

    Ok(())
}
