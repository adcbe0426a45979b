//! tmm-bench CLI
//!
//! Times one tiled matrix multiplication round trip (upload, kernel,
//! download) and prints the elapsed seconds.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tmm_bench::{BenchConfig, BenchError, BenchmarkRunner, Result};
use tmm_kernel::{Accelerator, BoundaryPolicy, CpuDevice};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Simulated device on the host thread pool.
    Cpu,
    /// Apple Metal GPU (requires the `metal` feature).
    Metal,
}

#[derive(Parser, Debug)]
#[command(name = "tmm-bench")]
#[command(version, about = "Time a tiled shared-memory matrix multiplication")]
struct Cli {
    /// Repeat factor: the matrices are (tile * repeat factor) square
    #[arg(short, long, alias = "coe", allow_negative_numbers = true)]
    repeat_factor: Option<i64>,

    /// Tile edge length (threads per group = tile * tile)
    #[arg(short, long)]
    tile: Option<usize>,

    /// Boundary policy for threads outside the matrix (both-axes, either-axis)
    #[arg(long)]
    boundary: Option<BoundaryPolicy>,

    /// Number of timed runs
    #[arg(long)]
    runs: Option<usize>,

    /// Accelerator backend
    #[arg(short, long, value_enum, default_value = "cpu")]
    backend: Backend,

    /// TOML config file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Check the product once before timing
    #[arg(long)]
    verify: bool,

    /// Print a JSON report instead of plain seconds
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Install the stderr subscriber. Returns false if one was already set, in
/// which case records keep going to the existing one.
fn init_logging() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => true,
        Err(e) => {
            log::warn!("keeping the existing log subscriber: {e}");
            false
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<BenchConfig> {
    let mut config = match (&cli.config, cli.repeat_factor) {
        (Some(path), _) => BenchConfig::from_file(path)?,
        (None, Some(repeat_factor)) => BenchConfig::new(repeat_factor)?,
        (None, None) => {
            return Err(BenchError::InvalidArgument(
                "either --repeat-factor or --config is required".to_string(),
            ))
        }
    };
    if cli.config.is_some() {
        if let Some(repeat_factor) = cli.repeat_factor {
            config = config.with_repeat_factor(repeat_factor)?;
        }
    }
    if let Some(boundary) = cli.boundary {
        config = config.with_boundary(boundary);
    }
    if let Some(tile) = cli.tile {
        config = config.with_tile(tile)?;
    }
    if let Some(runs) = cli.runs {
        config = config.with_runs(runs)?;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    log::info!(
        "n={} (tile {} x repeat {}), boundary={}, runs={}",
        config.matrix_dim(),
        config.tile_config().tile(),
        config.repeat_factor(),
        config.tile_config().boundary(),
        config.runs()
    );

    match cli.backend {
        Backend::Cpu => execute(CpuDevice::new(), config, &cli),
        Backend::Metal => run_metal(config, &cli),
    }
}

#[cfg(feature = "metal")]
fn run_metal(config: BenchConfig, cli: &Cli) -> Result<()> {
    execute(tmm_kernel::MetalDevice::new()?, config, cli)
}

#[cfg(not(feature = "metal"))]
fn run_metal(_config: BenchConfig, _cli: &Cli) -> Result<()> {
    Err(BenchError::InvalidArgument(
        "this binary was built without the `metal` feature".to_string(),
    ))
}

fn execute<A: Accelerator>(device: A, config: BenchConfig, cli: &Cli) -> Result<()> {
    let runner = BenchmarkRunner::new(device, config);
    if cli.verify {
        runner.verify()?;
    }

    let report = runner.report()?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for secs in &report.raw_seconds {
            println!("{secs:.6}");
        }
        if report.raw_seconds.len() > 1 {
            log::info!("{}", report.summary);
        }
    }
    Ok(())
}
