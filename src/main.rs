//! Trawl main entry point
//!
//! This is the command-line interface for the Trawl crawl-and-extract engine.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use trawl::config::{load_config_with_hash, validate, Config, EngineKind};
use trawl::output::print_summary;
use trawl::TrawlError;

/// Trawl: a declarative page crawl-and-extract engine
///
/// Trawl renders every start URL, extracts one record per page using the
/// configured CSS rules, follows "next page" links, and writes the records
/// to a JSON array.
#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(version)]
#[command(about = "A declarative page crawl-and-extract engine", long_about = None)]
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

    /// Write records here instead of the configured output path
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Override the configured render engine
    #[arg(long, value_enum)]
    engine: Option<EngineArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Static,
    Browser,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Static => EngineKind::Static,
            EngineArg::Browser => EngineKind::Browser,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if apply_overrides(&mut config, &cli) {
        validate(&config).context("Invalid command-line override")?;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("trawl=info,warn"),
            1 => EnvFilter::new("trawl=debug,info"),
            2 => EnvFilter::new("trawl=trace,debug"),
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

/// Applies command-line overrides; returns true if anything changed
fn apply_overrides(config: &mut Config, cli: &Cli) -> bool {
    let mut changed = false;

    if let Some(output) = &cli.output {
        tracing::info!("Output path overridden to {}", output.display());
        config.output.path = output.clone();
        changed = true;
    }

    if let Some(engine) = cli.engine {
        config.render.engine = engine.into();
        changed = true;
    }

    changed
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Trawl Dry Run ===\n");

    println!("Start URLs ({}):", config.crawler.start_urls.len());
    for url in &config.crawler.start_urls {
        println!("  - {}", url);
    }

    println!("\nFields ({}):", config.fields.len());
    for field in &config.fields {
        println!(
            "  - {}: '{}' -> {}{}",
            field.name,
            field.selector,
            field.attribute,
            if field.multiple { " (all matches)" } else { "" }
        );
    }

    println!("\nPagination:");
    match &config.crawler.pagination_selector {
        Some(selector) => println!("  '{}' [{}]", selector, config.crawler.pagination_attribute),
        None => println!("  disabled"),
    }
    if let Some(limit) = config.crawler.max_pages_per_job {
        println!("  Max pages per job: {}", limit);
    }

    println!("\nCrawl Control:");
    println!("  Attempts per page: {}", config.crawler.max_retries);
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    println!("  Page timeout: {}ms", config.crawler.page_timeout_ms);
    println!("  Concurrent jobs: {}", config.crawler.max_concurrent_jobs);
    if let Some(deadline) = config.crawler.run_deadline_secs {
        println!("  Run deadline: {}s", deadline);
    }

    println!("\nRender:");
    println!("  Engine: {:?}", config.render.engine);
    println!("  User agent: {}", config.render.user_agent);
    if let Some(wait_for) = &config.render.wait_for {
        println!("  Wait for: '{}'", wait_for);
    }

    println!("\nOutput:");
    println!("  Records: {}", config.output.path.display());
    if let Some(failures) = &config.output.failures_path {
        println!("  Failures: {}", failures.display());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling running jobs");
            signal_token.cancel();
        }
    });

    match trawl::crawl(config, cancel).await {
        Ok(result) => {
            print_summary(&result);
            Ok(())
        }
        Err(TrawlError::Sink { source, result }) => {
            print_summary(&result);
            Err(anyhow::Error::new(source).context("Crawl finished but its output could not be written"))
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
