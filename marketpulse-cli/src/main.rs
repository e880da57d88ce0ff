//! MarketPulse CLI: run, fetch and cache commands.
//!
//! Commands:
//! - `run`: fetch, analyze, chart and write the reports
//! - `fetch`: the fetch cycle only
//! - `cache status`: cache age, freshness and per-symbol row counts

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marketpulse_core::data::{BundleCache, DataFetcher};
use marketpulse_core::sink::ConsoleSink;
use marketpulse_runner::{run, MarketPulseConfig, RunLog};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "marketpulse",
    about = "MarketPulse: daily cross-market data, analysis and reports"
)]
struct Cli {
    /// Log level for the marketpulse crates when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, analyze, chart and report. Exits 1 unless every task succeeded.
    Run {
        /// Ignore a fresh cache and fetch from the providers.
        #[arg(long, default_value_t = false)]
        force_refresh: bool,

        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the fetch cycle only and update the cache.
    Fetch {
        #[arg(long, default_value_t = false)]
        force_refresh: bool,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cache age, freshness and per-symbol row counts.
    Status {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Run {
            force_refresh,
            config,
        } => run_cmd(config, force_refresh),
        Commands::Fetch {
            force_refresh,
            config,
        } => fetch_cmd(config, force_refresh),
        Commands::Cache { action } => match action {
            CacheAction::Status { config } => cache_status_cmd(config),
        },
    }
}

/// `RUST_LOG` wins; otherwise `level` applies to the marketpulse crates.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "marketpulse={level},marketpulse_core={level},marketpulse_runner={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<MarketPulseConfig> {
    let config = MarketPulseConfig::load(path.as_deref())?;
    tracing::debug!(?path, "config loaded");
    Ok(config)
}

fn network_fetcher(config: &MarketPulseConfig) -> Result<DataFetcher> {
    DataFetcher::from_settings(&config.fetch).context("Failed to set up data providers")
}

fn run_cmd(config_path: Option<PathBuf>, force_refresh: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let mut fetcher = network_fetcher(&config)?;
    let log = RunLog::new();

    let outcome = run(&config, &mut fetcher, &log, force_refresh)?;

    let report = log.snapshot();
    println!();
    println!("=== MarketPulse Run ===");
    println!(
        "Fetch:     {}/{} series{}",
        outcome.fetch.succeeded,
        outcome.fetch.total,
        if outcome.fetch.from_cache { " (cache)" } else { "" }
    );
    println!("Tasks:     {}/{} succeeded", outcome.tasks.succeeded, outcome.tasks.total);
    println!("Readings:  {}", outcome.readings);
    println!("Charts:    {}", report.charts.len());
    println!("Warnings:  {}", report.warnings.len());
    println!("Errors:    {}", report.errors.len());
    if let Some(secs) = report.duration_secs {
        println!("Duration:  {secs:.1}s");
    }
    println!("Report:    {}", outcome.reports.markdown.display());
    println!();

    if !outcome.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn fetch_cmd(config_path: Option<PathBuf>, force_refresh: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let mut fetcher = network_fetcher(&config)?;

    let summary = fetcher.fetch_all(force_refresh, &ConsoleSink);
    for symbol in config.extra_symbols() {
        fetcher.get_cached(&symbol, &ConsoleSink);
    }

    if !summary.all_succeeded() {
        for (symbol, err) in &summary.errors {
            eprintln!("Error for {symbol}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn cache_status_cmd(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let cache = BundleCache::new(&config.fetch.cache_dir, config.fetch.freshness());
    let status = cache.status();

    let Some(meta) = status.meta.as_ref().filter(|_| status.present) else {
        println!("No cached bundle in {}", config.fetch.cache_dir.display());
        return Ok(());
    };

    println!("Cache:      {}", status.blob_path.display());
    println!("Written:    {}", meta.last_update);
    if let Some(age) = status.age_secs {
        println!("Age:        {}", format_age(age));
    }
    println!(
        "Fresh:      {} (window {}h)",
        if status.fresh { "yes" } else { "no" },
        config.fetch.freshness_secs / 3600
    );
    println!("Hash:       {}", meta.data_hash);
    println!("Symbols:    {}", meta.data_types.len());
    println!();

    let bundle = cache.load().context("Failed to read cached bundle")?;
    println!("{:<24} {:>6}  {:<23}", "Symbol", "Rows", "Date Range");
    println!("{}", "-".repeat(56));
    for (symbol, series) in &bundle {
        let range = match (series.first(), series.last()) {
            (Some((start, _)), Some((end, _))) => format!("{start} to {end}"),
            _ => "(empty)".to_string(),
        };
        println!("{:<24} {:>6}  {:<23}", symbol, series.len(), range);
    }
    Ok(())
}

fn format_age(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "marketpulse",
            "--log-level",
            "debug",
            "run",
            "--force-refresh",
            "--config",
            "mp.toml",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Run {
                force_refresh,
                config,
            } => {
                assert!(force_refresh);
                assert_eq!(config, Some(PathBuf::from("mp.toml")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn cache_status_parses() {
        let cli = Cli::try_parse_from(["marketpulse", "cache", "status"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache {
                action: CacheAction::Status { config: None }
            }
        ));
    }

    #[test]
    fn ages_are_human_readable() {
        assert_eq!(format_age(42.0), "42s");
        assert_eq!(format_age(125.0), "2m");
        assert_eq!(format_age(3.0 * 3600.0 + 900.0), "3h 15m");
        assert_eq!(format_age(-5.0), "0s");
    }
}
