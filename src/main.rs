//! Site-Mapper main entry point
//!
//! This is the command-line interface for the Site-Mapper site structure mapper.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use site_mapper::config::{load_config_with_hash, validate, Config};
use site_mapper::crawler::run_batch;
use site_mapper::output::print_statistics;
use site_mapper::server;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Site-Mapper: maps the structure of a single website
///
/// Site-Mapper crawls one site breadth-first from a seed URL, follows only
/// links that stay on the site, and writes the result as a JSON graph and a
/// Markdown outline.
#[derive(Parser, Debug)]
#[command(name = "site-mapper")]
#[command(version)]
#[command(about = "Maps the structure of a single website", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site once and write its sitemap
    Crawl(CrawlArgs),

    /// Serve the interactive HTTP API
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8000
        #[arg(long)]
        bind: Option<String>,
    },

    /// Validate the configuration and show the effective settings
    CheckConfig,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Seed URL; overrides `seed` from the configuration file
    #[arg(value_name = "SEED")]
    seed: Option<String>,

    /// Directory for the sitemap files
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Stop after this many pages
    #[arg(long)]
    max_pages: Option<u64>,

    /// Do not follow links deeper than this
    #[arg(long)]
    max_depth: Option<u32>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    time_budget: Option<u64>,

    /// Pause between requests in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load(cli.config.as_ref())?;

    match cli.command {
        Command::Crawl(args) => handle_crawl(config, args).await,
        Command::Serve { bind } => handle_serve(config, bind).await,
        Command::CheckConfig => handle_check_config(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_mapper=info,warn"),
            1 => EnvFilter::new("site_mapper=debug,info"),
            2 => EnvFilter::new("site_mapper=trace,debug"),
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

/// Loads the configuration file, or the defaults when none is given
fn load(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        tracing::debug!("No configuration file given, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

/// Handles the `crawl` command
async fn handle_crawl(mut config: Config, args: CrawlArgs) -> anyhow::Result<ExitCode> {
    if let Some(output) = args.output {
        config.output.directory = output.to_string_lossy().into_owned();
    }
    if args.max_pages.is_some() {
        config.crawler.max_pages = args.max_pages;
    }
    if args.max_depth.is_some() {
        config.crawler.max_depth = args.max_depth;
    }
    if args.time_budget.is_some() {
        config.crawler.time_budget_secs = args.time_budget;
    }
    if let Some(delay) = args.delay_ms {
        config.crawler.delay_ms = delay;
    }
    validate(&config).context("Invalid settings")?;

    let Some(seed) = args.seed.or_else(|| config.seed.clone()) else {
        bail!("No seed URL given; pass one on the command line or set `seed` in the configuration");
    };

    // Ctrl-C stops the run; the partial sitemap is still written
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current page");
            on_interrupt.cancel();
        }
    });

    match run_batch(&seed, &config, cancel).await {
        Ok(report) => {
            tracing::info!("Crawl {} ({})", report.run_state, report.reason);
            println!("Graph:   {}", report.written.graph_path.display());
            println!("Outline: {}", report.written.outline_path.display());
            println!();
            print_statistics(&report.statistics);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Handles the `serve` command
async fn handle_serve(mut config: Config, bind: Option<String>) -> anyhow::Result<ExitCode> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    validate(&config).context("Invalid settings")?;

    server::serve(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await?;

    Ok(ExitCode::SUCCESS)
}

/// Handles the `check-config` command: validates config and shows the settings
fn handle_check_config(config: &Config) -> anyhow::Result<ExitCode> {
    validate(config)?;

    println!("=== Site-Mapper Configuration ===\n");

    println!("Seed: {}", config.seed.as_deref().unwrap_or("(none)"));

    println!("\nCrawler:");
    println!("  Max pages: {}", limit(config.crawler.max_pages));
    println!("  Max depth: {}", limit(config.crawler.max_depth));
    println!(
        "  Time budget: {}",
        config
            .crawler
            .time_budget_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "unlimited".to_string())
    );
    println!("  Delay: {}ms", config.crawler.delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Scope: {:?}", config.crawler.scope);
    println!("  Strip index documents: {}", config.crawler.strip_index);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Graph: {}", config.output.graph_file);
    println!("  Outline: {}", config.output.outline_file);

    println!("\nServer: {}", config.server.bind);
    println!("  Finished runs kept: {}s", config.server.run_retention_secs);

    println!("\nConfiguration is valid");

    Ok(ExitCode::SUCCESS)
}

fn limit<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unlimited".to_string())
}
