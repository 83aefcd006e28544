//! Catalog-Sweep main entry point
//!
//! This is the command-line interface for the Catalog-Sweep storefront crawler.

use anyhow::Context;
use catalog_sweep::config::{load_config_or_default, load_config_with_hash, Config, PipelineKind};
use catalog_sweep::crawler::{output_path, run_pipeline, CrawlContext, PipelineReport};
use catalog_sweep::extract::SiteProfile;
use catalog_sweep::logging::init_logging;
use catalog_sweep::output::{print_reconcile, print_statistics, reconcile};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Catalog-Sweep: a resilient storefront crawler
///
/// Crawls catalog-style storefronts, surviving rate limits and inconsistent
/// markup, and writes the extracted records as JSON datasets.
#[derive(Parser, Debug)]
#[command(name = "catalog-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A resilient storefront crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl paginated listings and extract product cards
    Products,
    /// Walk brand index, collections and product pages, collecting detail records
    Catalog,
    /// Collect the expected product total of every collection
    Count,
    /// Extract detail records for a previously collected link file
    Details,
    /// Compare expected totals against scraped records
    Reconcile {
        /// Count pipeline output (defaults to its configured output)
        #[arg(long, value_name = "FILE")]
        counts: Option<PathBuf>,

        /// Catalog pipeline output (defaults to its configured output)
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,
    },
    /// Run the catalog and count pipelines concurrently
    All,
}

impl Command {
    fn pipelines(&self) -> Vec<PipelineKind> {
        match self {
            Self::Products => vec![PipelineKind::Products],
            Self::Catalog => vec![PipelineKind::Catalog],
            Self::Count => vec![PipelineKind::Count],
            Self::Details => vec![PipelineKind::Details],
            Self::Reconcile { .. } => Vec::new(),
            Self::All => vec![PipelineKind::Catalog, PipelineKind::Count],
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load and validate configuration
    let (config, config_hash) = match &cli.config {
        Some(path) => load_config_with_hash(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => (
            load_config_or_default(None)?,
            "built-in defaults".to_string(),
        ),
    };

    let _log_guard = init_logging(Path::new(&config.output.log_dir), cli.verbose, cli.quiet)?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let profile_path = config.site.profile_path.as_deref().map(Path::new);
    let profile = SiteProfile::load(profile_path).context("Failed to load selector table")?;
    tracing::info!("Selector table loaded (version: {})", profile.version);

    if cli.dry_run {
        handle_dry_run(&config, &profile, &cli.command);
        return Ok(());
    }

    let ctx = CrawlContext::new(config, profile);

    match cli.command {
        Command::Reconcile { counts, catalog } => handle_reconcile(&ctx, counts, catalog),
        Command::All => {
            let (catalog, count) = tokio::join!(
                run_pipeline(&ctx, PipelineKind::Catalog),
                run_pipeline(&ctx, PipelineKind::Count)
            );
            let catalog = catalog.map(|report| print_report(&report));
            let count = count.map(|report| print_report(&report));
            catalog.context("Catalog pipeline failed")?;
            count.context("Count pipeline failed")?;
            Ok(())
        }
        command => {
            for kind in command.pipelines() {
                match run_pipeline(&ctx, kind).await {
                    Ok(report) => print_report(&report),
                    Err(e) => {
                        tracing::error!("{} pipeline failed: {}", kind.name(), e);
                        return Err(e.into());
                    }
                }
            }
            Ok(())
        }
    }
}

fn print_report(report: &PipelineReport) {
    print_statistics(&report.stats);
    match &report.output {
        Some(path) => println!("✓ Dataset written to: {}\n", path.display()),
        None => println!("✗ No records collected, no dataset written\n"),
    }
}

/// Handles the reconcile command
fn handle_reconcile(
    ctx: &CrawlContext,
    counts: Option<PathBuf>,
    catalog: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = &ctx.config;
    let counts = counts
        .unwrap_or_else(|| output_path(ctx, &config.pipeline(PipelineKind::Count).output));
    let catalog = catalog
        .unwrap_or_else(|| output_path(ctx, &config.pipeline(PipelineKind::Catalog).output));

    tracing::info!(
        "Reconciling {} against {}",
        counts.display(),
        catalog.display()
    );
    let report = reconcile(&counts, &catalog).context("Reconciliation failed")?;
    print_reconcile(&report);
    Ok(())
}

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config, profile: &SiteProfile, command: &Command) {
    println!("=== Catalog-Sweep Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Global max concurrent fetches: {}",
        config.crawler.global_max_concurrent_fetches
    );
    println!(
        "  Page delay: {}-{}ms",
        config.crawler.page_delay_ms.min_ms(),
        config.crawler.page_delay_ms.max_ms()
    );
    println!("  Allowed domains: {}", config.crawler.allowed_domains.join(", "));
    println!("  Dedupe: {}", config.crawler.dedupe);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Max network attempts: {}", config.retry.max_network_attempts);
    println!("  Max delay: {}ms", config.retry.max_delay_ms);

    println!("\nSelector Table:");
    println!(
        "  Source: {}",
        config.site.profile_path.as_deref().unwrap_or("built-in")
    );
    println!("  Version: {}", profile.version);
    println!("  Default brand: {}", profile.default_brand);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Logs: {}", config.output.log_dir);

    for kind in command.pipelines() {
        let settings = config.pipeline(kind);
        println!("\nPipeline '{}':", kind.name());
        println!("  Strategy: {}", settings.strategy);
        println!(
            "  Max concurrent fetches: {}",
            settings.max_concurrent_fetches
        );
        for url in &settings.start_urls {
            println!("    * {}", url);
        }
        if let Some(links_file) = &settings.links_file {
            println!("  Links file: {}", links_file);
        }
        println!("  Output: {}", settings.output);
    }

    println!("\n✓ Configuration is valid");
}
