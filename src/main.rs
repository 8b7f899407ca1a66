//! Pagewise main entry point
//!
//! This is the command-line interface for the Pagewise pagination fetcher.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use pagewise::config::{load_config_with_hash, validate, Config};
use pagewise::fetch::{HttpPageFetcher, PageFetcher, SimulatedFetcher};
use pagewise::output::{
    generate_markdown_report, print_profile, print_report, ReportHeader, RunOutcome,
};
use pagewise::scheduler::{
    run_adaptive, run_fixed, run_profile, AdaptiveOptions, ProfileOptions, RunOptions,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Pagewise: an adaptive parallel pagination fetcher
///
/// Pagewise fetches a known number of pages from a paginated JSON API in
/// rounds of bounded concurrency. The round size is fixed, recommended by
/// profiling, or tuned between rounds from observed throughput and errors.
#[derive(Parser, Debug)]
#[command(name = "pagewise")]
#[command(version = "1.0.0")]
#[command(about = "An adaptive parallel pagination fetcher", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Scheduling mode
    #[arg(long, value_enum, default_value_t = Mode::Adaptive)]
    mode: Mode,

    /// Override the number of pages to fetch
    #[arg(long, value_name = "N")]
    pages: Option<u32>,

    /// Override the batch size for fixed runs
    #[arg(long, value_name = "K")]
    batch_size: Option<usize>,

    /// Override the run deadline in milliseconds
    #[arg(long, value_name = "MS")]
    deadline_ms: Option<u64>,

    /// Replace the HTTP API with a simulated one answering after MS milliseconds
    #[arg(long, value_name = "MS")]
    simulate: Option<u64>,

    /// Validate config and show the planned run without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Every round has the configured batch size
    Fixed,
    /// Benchmark candidate batch sizes and recommend one
    Profile,
    /// Tune the round size between rounds
    Adaptive,
}

impl Mode {
    fn name(self) -> &'static str {
        match self {
            Mode::Fixed => "fixed",
            Mode::Profile => "profile",
            Mode::Adaptive => "adaptive",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_effective_config(&cli)?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        return Ok(());
    }

    let fetcher: Box<dyn PageFetcher> = match cli.simulate {
        Some(ms) => {
            tracing::info!("Simulating the API with {}ms per page", ms);
            Box::new(SimulatedFetcher::new(Duration::from_millis(ms)))
        }
        None => Box::new(
            HttpPageFetcher::new(&config.api, &config.user_agent)
                .context("Failed to build HTTP client")?,
        ),
    };

    let header = ReportHeader {
        mode: cli.mode.name().to_string(),
        started_at: Utc::now(),
        config_hash: Some(config_hash),
        source: match cli.simulate {
            Some(ms) => format!("simulated ({}ms per page)", ms),
            None => config.api.base_url.clone(),
        },
    };

    let outcome = handle_run(&config, cli.mode, fetcher.as_ref()).await?;

    match &outcome {
        RunOutcome::Report(report) => print_report(report),
        RunOutcome::Profile(profile) => print_profile(profile),
    }

    if let Some(path) = &config.output.summary_path {
        generate_markdown_report(&header, &outcome, Path::new(path))
            .with_context(|| format!("Failed to write summary to {}", path))?;
        println!("\n✓ Summary written to: {}", path);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagewise=info,warn"),
            1 => EnvFilter::new("pagewise=debug,info"),
            2 => EnvFilter::new("pagewise=trace,debug"),
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

/// Loads the configuration file and applies command-line overrides
///
/// The overridden configuration is validated again so a flag cannot
/// reintroduce a value the file would have been rejected for.
fn load_effective_config(cli: &Cli) -> anyhow::Result<(Config, String)> {
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    apply_overrides(&mut config, cli);
    validate(&config).context("Invalid command-line override")?;

    Ok((config, config_hash))
}

/// Applies command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(pages) = cli.pages {
        config.scheduler.total_pages = pages;
    }
    if let Some(batch_size) = cli.batch_size {
        config.scheduler.batch_size = batch_size;
    }
    if let Some(deadline_ms) = cli.deadline_ms {
        config.scheduler.deadline_ms = Some(deadline_ms);
    }
}

/// Builds run options from the scheduler and API sections
fn run_options(config: &Config) -> RunOptions {
    let mut options = RunOptions::default()
        .with_params(config.api.params.clone())
        .with_baseline(config.scheduler.baseline_pages);
    if let Some(timeout) = config.scheduler.page_timeout() {
        options = options.with_page_timeout(timeout);
    }
    if let Some(deadline) = config.scheduler.deadline() {
        options = options.with_deadline(deadline);
    }
    options
}

/// Handles the --dry-run mode: shows the planned run
fn handle_dry_run(config: &Config, cli: &Cli) {
    let scheduler = &config.scheduler;

    println!("=== Pagewise Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Page parameter: {}", config.api.page_param);
    match &config.api.items_field {
        Some(field) => println!("  Items field: {}", field),
        None => println!("  Items field: (top-level array)"),
    }
    for (key, value) in &config.api.params {
        println!("  Param {} = {}", key, value);
    }

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.client_name);
    println!("  Version: {}", config.user_agent.client_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nScheduler ({}):", cli.mode.name());
    println!("  Total pages: {}", scheduler.total_pages);
    match cli.mode {
        Mode::Fixed => {
            let rounds = (scheduler.total_pages as usize).div_ceil(scheduler.batch_size.max(1));
            println!("  Batch size: {} ({} rounds)", scheduler.batch_size, rounds);
        }
        Mode::Profile => {
            println!("  Candidates: {:?}", scheduler.candidates);
            println!("  Sample rounds: {}", scheduler.sample_rounds);
        }
        Mode::Adaptive => {
            println!(
                "  Concurrency: start {}, max {}",
                scheduler.initial_concurrency, scheduler.max_concurrency
            );
            println!(
                "  Tuning: step {}, throughput tolerance {:.0}%, error tolerance {:.0}%",
                config.tuning.step,
                config.tuning.throughput_tolerance * 100.0,
                config.tuning.error_tolerance * 100.0
            );
        }
    }
    if let Some(deadline) = scheduler.deadline() {
        println!("  Deadline: {:?}", deadline);
    }
    if let Some(timeout) = scheduler.page_timeout() {
        println!("  Page timeout: {:?}", timeout);
    }
    println!("  Baseline pages: {}", scheduler.baseline_pages);

    println!("\n✓ Configuration is valid");
}

/// Runs the selected scheduling mode
async fn handle_run(
    config: &Config,
    mode: Mode,
    fetcher: &dyn PageFetcher,
) -> anyhow::Result<RunOutcome> {
    let scheduler = &config.scheduler;
    let options = run_options(config);

    let outcome = match mode {
        Mode::Fixed => RunOutcome::Report(
            run_fixed(scheduler.total_pages, scheduler.batch_size, fetcher, &options).await?,
        ),
        Mode::Profile => {
            let profile = ProfileOptions {
                sample_rounds: scheduler.sample_rounds,
                run: options,
            };
            RunOutcome::Profile(
                run_profile(scheduler.total_pages, &scheduler.candidates, fetcher, &profile)
                    .await?,
            )
        }
        Mode::Adaptive => {
            let adaptive =
                AdaptiveOptions::new(scheduler.initial_concurrency, scheduler.max_concurrency)
                    .with_tuning(config.tuning.clone());
            RunOutcome::Report(
                run_adaptive(scheduler.total_pages, fetcher, &adaptive, &options).await?,
            )
        }
    };

    Ok(outcome)
}
