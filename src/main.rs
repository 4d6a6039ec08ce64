//! CLI entry point: thin glue that builds a [`SimConfig`], runs the
//! requested mode(s), and prints the summary line(s).

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use splitsim::driver::{simulate_accuracy, simulate_compounding, SimConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Year of back-to-back tests with compounding promotions
    Compounding,
    /// Independent trials scored against ground truth
    Accuracy,
    /// Run both experiments
    Both,
}

#[derive(Parser)]
#[command(name = "splitsim")]
#[command(version)]
#[command(about = "Monte Carlo simulator for sequential A/B testing decision strategies")]
struct Args {
    /// Which experiment to run
    #[arg(long, value_enum, default_value = "compounding")]
    mode: Mode,

    /// JSON configuration file (fields default when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of independent simulation runs
    #[arg(long)]
    runs: Option<u32>,

    /// Override the base RNG seed for a reproducible batch
    #[arg(long)]
    seed: Option<u64>,

    /// Per-trial debug narration (use runs=1 to keep it readable)
    #[arg(long, short)]
    verbose: bool,
}

fn load_config(args: &Args) -> anyhow::Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if let Some(runs) = args.runs {
        config.simulation_runs = runs;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;

    if matches!(args.mode, Mode::Compounding | Mode::Both) {
        let report = simulate_compounding(&config).context("compounding-strategy simulation")?;
        println!("{}", report.summary());
    }
    if matches!(args.mode, Mode::Accuracy | Mode::Both) {
        let report = simulate_accuracy(&config).context("decision-accuracy simulation")?;
        println!("{}", report.summary());
    }
    Ok(())
}
