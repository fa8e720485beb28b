use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn, LevelFilter};
use std::path::PathBuf;
use std::time::Instant;

mod cell;
mod diagnostics;
mod grid;
mod input;
mod journal;
mod orchestrator;
mod persist;
mod reader;
mod reduction;
mod trajectory;

use diagnostics_common::{DiagnosticsConfig, OutputFormat};
use journal::RunJournal;
use orchestrator::DiagnosticsRun;

#[derive(Parser, Debug)]
#[command(author, version, about = "Eccentricity diagnostics for polar-grid disk simulations", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulation run directory (required without --config)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory for diagnostics (required without --config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Snapshots held in memory at once
    #[arg(long)]
    batch_size: Option<usize>,

    /// Persisted array format: bincode, json or messagepack
    #[arg(long)]
    format: Option<String>,

    /// Gravitational parameter of the central mass
    #[arg(long)]
    gm: Option<f64>,

    /// Ignore any configured companion trajectory
    #[arg(long)]
    no_trajectory: bool,
}

fn build_config(args: &Args) -> Result<DiagnosticsConfig> {
    let mut config = match (&args.config, &args.input, &args.output) {
        (Some(path), _, _) => DiagnosticsConfig::load(path)?,
        (None, Some(input), Some(output)) => DiagnosticsConfig::with_directories(input, output),
        _ => anyhow::bail!("Either --config or both --input and --output are required."),
    };

    if let Some(input) = &args.input {
        config.input.directory = input.clone();
    }
    if let Some(output) = &args.output {
        config.output.directory = output.clone();
    }
    if let Some(size) = args.batch_size {
        config.batch.size = size;
    }
    if let Some(name) = &args.format {
        config.output.format =
            OutputFormat::parse(name).with_context(|| format!("Unknown output format '{}'.", name))?;
    }
    if let Some(gm) = args.gm {
        config.physics.gm = gm;
    }
    if args.no_trajectory {
        config.trajectory = None;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    Builder::from_default_env().filter(None, LevelFilter::Info).init();

    info!("Starting disk diagnostics...");
    let config = build_config(&args)?;
    debug!("Configuration: {:#?}", config);

    let mut run = DiagnosticsRun::new(config).context("Failed to open simulation run")?;
    let total = run.total_snapshots();
    info!(
        "Run has {} snapshots on a {}x{} grid (batch size {}, format {:?}).",
        total,
        run.geometry().num_radial(),
        run.geometry().num_theta(),
        run.config().batch.size,
        run.config().output.format
    );
    if !run.has_companion() {
        info!("No companion trajectory; companion series will be empty.");
    }

    let mut journal = RunJournal::open(run.store().root()).context("Failed to open run journal")?;
    journal.record_start(total, &run.config().input.directory.display().to_string())?;

    let start_time = Instant::now();
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} snapshots ({percent}%) [{eta}]")?
            .progress_chars("#>-"),
    );

    let processed = run.run_batches(&mut journal, &progress);
    progress.finish_and_clear();
    let processed = processed.context("Batch loop aborted")?;
    info!("Processed {} snapshots in {:.2} s.", processed, start_time.elapsed().as_secs_f64());

    info!("Concatenating diagnostic series...");
    let series = run.concatenate_all(&mut journal).context("Concatenation failed")?;
    let empty = series.iter().filter(|s| s.data.is_empty()).count();
    if empty > 0 {
        warn!("{} of {} diagnostics are empty.", empty, series.len());
    }

    journal.record_finish(processed)?;
    journal.close()?;
    info!(
        "Diagnostics written to {} in {:.2} s.",
        run.store().root().display(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
