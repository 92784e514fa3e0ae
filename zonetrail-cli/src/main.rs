//! Zonetrail CLI — scan bar files for crossovers, signals and trailing-stop
//! decisions.
//!
//! Commands:
//! - `scan` — replay CSV bar files through the pipeline and print JSON Lines
//! - `synth` — generate seeded random-walk bars as CSV, or scan them directly
//! - `check-config` — validate a TOML configuration and print its fingerprint
//!
//! Logs go to stderr; `--log-level` sets the default filter and `RUST_LOG`
//! overrides it.

mod data;
mod scan;

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use zonetrail_core::EngineConfig;

use crate::data::{generate_synthetic_bars, write_bars};
use crate::scan::{scan_bars, scan_files, write_report};

#[derive(Parser)]
#[command(
    name = "zonetrail",
    about = "Zonetrail CLI — lagged crossover detection and zone-aware trailing stops"
)]
struct Cli {
    /// Default log filter when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay CSV bar files and print every event as JSON Lines.
    Scan {
        /// Bar files (time,open,high,low,close[,volume]). The file stem is the symbol.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// TOML configuration. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print only the per-symbol summary lines.
        #[arg(long, default_value_t = false)]
        summary_only: bool,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate a seeded random walk.
    Synth {
        /// RNG seed; the same seed always yields the same bars.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of bars.
        #[arg(long, default_value_t = 2_000)]
        bars: usize,

        /// Symbol written into the bars.
        #[arg(long, default_value = "SYN")]
        symbol: String,

        /// Minutes between bars.
        #[arg(long, default_value_t = 60)]
        step_minutes: i64,

        /// First bar time (YYYY-MM-DD HH:MM:SS).
        #[arg(long, default_value = "2024-01-01 00:00:00")]
        start: String,

        /// Scan the generated bars instead of printing them as CSV.
        #[arg(long, default_value_t = false)]
        scan: bool,

        /// TOML configuration for `--scan`.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a TOML configuration and print its fingerprint.
    CheckConfig {
        /// Configuration file. Checks the defaults when omitted.
        config: Option<PathBuf>,

        /// Also print the fully resolved configuration.
        #[arg(long, default_value_t = false)]
        resolved: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Scan {
            files,
            config,
            summary_only,
            output,
        } => run_scan(&files, config.as_deref(), summary_only, output.as_deref()),
        Commands::Synth {
            seed,
            bars,
            symbol,
            step_minutes,
            start,
            scan,
            config,
            output,
        } => run_synth(
            seed,
            bars,
            &symbol,
            step_minutes,
            &start,
            scan,
            config.as_deref(),
            output.as_deref(),
        ),
        Commands::CheckConfig { config, resolved } => run_check_config(config.as_deref(), resolved),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    })
}

fn run_scan(
    files: &[PathBuf],
    config_path: Option<&Path>,
    summary_only: bool,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let config_id = config.fingerprint()?;
    info!(config = config_id.short(), files = files.len(), "starting scan");

    let results = scan_files(&config, files);
    let mut out = open_output(output)?;
    let mut failed = Vec::new();
    for (path, result) in results {
        match result {
            Ok(report) => write_report(&mut out, &config_id, &report, summary_only)?,
            Err(e) => {
                eprintln!("Error for {}: {e:#}", path.display());
                failed.push(path);
            }
        }
    }
    out.flush()?;

    if !failed.is_empty() {
        bail!("{} of {} files failed", failed.len(), files.len());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_synth(
    seed: u64,
    count: usize,
    symbol: &str,
    step_minutes: i64,
    start: &str,
    scan: bool,
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    if step_minutes <= 0 {
        bail!("--step-minutes must be positive");
    }
    let start = NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("invalid --start '{start}'"))?;
    let bars = generate_synthetic_bars(symbol, seed, count, start, step_minutes);
    info!(%symbol, seed, bars = bars.len(), "generated synthetic bars");

    let mut out = open_output(output)?;
    if scan {
        let config = load_config(config_path)?;
        let config_id = config.fingerprint()?;
        let report = scan_bars(&config, symbol, &bars)?;
        write_report(&mut out, &config_id, &report, false)?;
    } else {
        if config_path.is_some() {
            bail!("--config is only used together with --scan");
        }
        write_bars(&mut out, &bars)?;
    }
    out.flush()?;
    Ok(())
}

fn run_check_config(path: Option<&Path>, resolved: bool) -> Result<()> {
    let config = load_config(path)?;
    let id = config.fingerprint()?;

    let source = path.map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string());
    println!("Config: {source}");
    println!("Fingerprint: {id}");
    println!("Detectors:");
    for detector in &config.detectors {
        let lags: Vec<String> = detector.recheck_lags().map(|l| l.to_string()).collect();
        println!(
            "  {:<16} mode={:<12} rechecks=[{}]",
            detector.name,
            detector.mode.to_string(),
            lags.join(",")
        );
    }
    println!(
        "Tracked oscillators: {}",
        config
            .risk
            .tracked
            .iter()
            .map(|t| t.kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    if resolved {
        println!();
        println!(
            "{}",
            toml::to_string_pretty(&config).context("failed to render configuration")?
        );
    }
    Ok(())
}
