//! tpcreco CLI
//!
//! Reconstructs per-primary clusters from transport step tables.
#![allow(clippy::cast_precision_loss)]

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tpcreco_algorithms::{run_streams, ReconstructionConfig};
use tpcreco_core::config::{ContainmentPolicy, EnergyUnit};
use tpcreco_core::source::RowSink;
use tpcreco_core::step::particle_name;
use tpcreco_io::{create_sink, OutputFormat, StepFileReader};

/// Prefix of generated output file names.
const OUTPUT_PREFIX: &str = "elab_";

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    TpcrecoIo(#[from] tpcreco_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] tpcreco_core::Error),

    #[error("invalid arguments: {0}")]
    Usage(String),

    #[error("{failed} of {total} input file(s) failed")]
    RunFailed { failed: usize, total: usize },
}

/// Containment policy selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    /// Radial cut around the cylinder axis only
    RadialCylinder,
    /// Radial cut, or inside the wedge facing the source
    CylinderWithWedge,
}

impl From<Policy> for ContainmentPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::RadialCylinder => Self::RadialCylinder,
            Policy::CylinderWithWedge => Self::CylinderWithWedge,
        }
    }
}

/// Output energy unit.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Unit {
    #[value(name = "MeV", alias = "mev")]
    Mev,
    #[value(name = "keV", alias = "kev")]
    Kev,
}

impl From<Unit> for EnergyUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Mev => Self::MeV,
            Unit::Kev => Self::KeV,
        }
    }
}

/// Output file format.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Jsonl,
    Hdf5,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => Self::Csv,
            Format::Jsonl => Self::JsonLines,
            Format::Hdf5 => Self::Hdf5,
        }
    }
}

/// Step-to-cluster reconstruction for gas TPC simulations.
#[derive(Parser)]
#[command(name = "tpcreco")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct clusters from step table(s)
    Process {
        /// Input step table(s); independent files run in parallel
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output file (single input only)
        #[arg(short, long, conflicts_with = "output_dir")]
        output: Option<PathBuf>,

        /// Directory for generated output files (default: next to each input)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Output format (default: from the output extension, else CSV)
        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Containment policy
        #[arg(long, value_enum)]
        policy: Option<Policy>,

        /// Drop clusters that fail containment
        #[arg(long)]
        veto: bool,

        /// Output energy unit
        #[arg(long, value_enum)]
        energy_unit: Option<Unit>,

        /// Log progress every N events (0 disables)
        #[arg(long)]
        progress_interval: Option<u64>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a step table
    Info {
        /// Input step table
        input: PathBuf,
    },
}

struct Overrides {
    policy: Option<Policy>,
    veto: bool,
    energy_unit: Option<Unit>,
    progress_interval: Option<u64>,
}

fn build_config(path: Option<&Path>, overrides: &Overrides) -> Result<ReconstructionConfig> {
    let mut config = match path {
        Some(path) => tpcreco_io::load_config(path)?,
        None => ReconstructionConfig::default(),
    };
    if let Some(policy) = overrides.policy {
        config = config.with_policy(policy.into());
    }
    if overrides.veto {
        config = config.with_selection_veto(true);
    }
    if let Some(unit) = overrides.energy_unit {
        config = config.with_energy_unit(unit.into());
    }
    if let Some(interval) = overrides.progress_interval {
        config = config.with_progress_interval(interval);
    }
    config.validate()?;
    Ok(config)
}

/// Derives `elab_<stem>.<ext>` next to the input, or inside `dir`.
fn derived_output(input: &Path, dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "steps".into(), |s| s.to_string_lossy());
    let name = format!("{OUTPUT_PREFIX}{stem}.{}", format.extension());
    match dir.or_else(|| input.parent()) {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

fn resolve_outputs(
    inputs: &[PathBuf],
    output: Option<PathBuf>,
    output_dir: Option<&Path>,
    format: Option<Format>,
) -> Result<Vec<(PathBuf, OutputFormat)>> {
    if let Some(output) = output {
        if inputs.len() != 1 {
            return Err(CliError::Usage(
                "--output takes a single input; use --output-dir for several".to_string(),
            ));
        }
        let format = format
            .map(OutputFormat::from)
            .or_else(|| OutputFormat::from_path(&output))
            .unwrap_or(OutputFormat::Csv);
        return Ok(vec![(output, format)]);
    }

    let format = format.map_or(OutputFormat::Csv, OutputFormat::from);
    Ok(inputs
        .iter()
        .map(|input| (derived_output(input, output_dir, format), format))
        .collect())
}

/// Opens every input before any output is created, so a bad input leaves
/// no output files behind.
fn open_streams(
    input: &[PathBuf],
    outputs: &[(PathBuf, OutputFormat)],
    unit: EnergyUnit,
) -> Result<Vec<(StepFileReader, Box<dyn RowSink + Send>)>> {
    let readers = input
        .iter()
        .map(StepFileReader::open)
        .collect::<tpcreco_io::Result<Vec<_>>>()?;

    let mut streams = Vec::with_capacity(readers.len());
    for ((reader, path), (output, format)) in readers.into_iter().zip(input).zip(outputs) {
        let sink = create_sink(output, *format, unit)?;
        info!("{} -> {}", path.display(), output.display());
        streams.push((reader, sink));
    }
    Ok(streams)
}

fn process(
    input: &[PathBuf],
    outputs: &[(PathBuf, OutputFormat)],
    config: &ReconstructionConfig,
) -> Result<()> {
    let start = Instant::now();

    let streams = open_streams(input, outputs, config.energy_unit)?;

    let results = run_streams(streams, config);

    let mut failed = 0usize;
    let mut total_rows = 0u64;
    for ((path, (output, _)), result) in input.iter().zip(outputs).zip(results) {
        match result {
            Ok(summary) => {
                total_rows += summary.rows_written;
                println!(
                    "{}: {} events, {} clusters -> {}",
                    path.display(),
                    summary.events_read,
                    summary.rows_written,
                    output.display()
                );
                if summary.rows_vetoed > 0 {
                    println!("  {} clusters vetoed by containment", summary.rows_vetoed);
                }
            }
            Err(e) => {
                failed += 1;
                error!("{}: {e}", path.display());
            }
        }
    }

    println!(
        "Processed {} file(s) in {:.2}s, {} clusters written",
        input.len(),
        start.elapsed().as_secs_f64(),
        total_rows
    );

    if failed > 0 {
        return Err(CliError::RunFailed {
            failed,
            total: input.len(),
        });
    }
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let mut reader = StepFileReader::open(input)?;
    let file_size = reader.file_size();

    let mut empty_events = 0u64;
    let mut primaries = 0u64;
    let mut total_edep = 0.0f64;
    let mut time_range: Option<(f64, f64)> = None;
    let mut species: BTreeMap<i32, u64> = BTreeMap::new();

    while let Some(event) = reader.read_event()? {
        if event.is_empty() {
            empty_events += 1;
        }
        let mut roots = HashSet::new();
        for step in &event.steps {
            if step.parent_id == 0 {
                roots.insert(step.track_id);
            }
            *species.entry(step.pdg).or_default() += 1;
            total_edep += step.energy_deposit;
            time_range = Some(match time_range {
                Some((lo, hi)) => (lo.min(step.time), hi.max(step.time)),
                None => (step.time, step.time),
            });
        }
        primaries += roots.len() as u64;
    }

    println!("File: {}", input.display());
    println!(
        "Size: {} bytes ({:.2} MB)",
        file_size,
        file_size as f64 / 1_000_000.0
    );
    println!(
        "Events: {} ({} empty)",
        reader.events_read(),
        empty_events
    );
    println!("Steps: {}", reader.steps_read());
    println!("Primary tracks: {primaries}");
    println!("Total energy deposit: {total_edep} MeV");
    if let Some((lo, hi)) = time_range {
        println!("Time range: {lo} - {hi} ns");
    }
    for (pdg, count) in &species {
        println!("  {:<10} {count}", particle_name(*pdg));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            output_dir,
            format,
            config,
            policy,
            veto,
            energy_unit,
            progress_interval,
            verbose,
        } => {
            let default_filter = if verbose { "debug" } else { "info" };
            let env = env_logger::Env::default().default_filter_or(default_filter);
            env_logger::Builder::from_env(env).init();

            let overrides = Overrides {
                policy,
                veto,
                energy_unit,
                progress_interval,
            };
            let config = build_config(config.as_deref(), &overrides)?;
            let outputs = resolve_outputs(&input, output, output_dir.as_deref(), format)?;
            process(&input, &outputs, &config)?;
        }

        Commands::Info { input } => {
            env_logger::init();
            show_info(&input)?;
        }
    }

    Ok(())
}
