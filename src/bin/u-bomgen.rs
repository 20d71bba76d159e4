//! u-bomgen CLI
//!
//! Builds BOM tree batches from a JSON configuration file.

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use u_bomgen::config::BatchConfig;
use u_bomgen::driver::{run_bounded, run_fixed, RunSummary};
use u_bomgen::logging;

/// Synthetic BOM tree generator
#[derive(Parser)]
#[command(name = "u-bomgen")]
#[command(about = "Generate synthetic BOM trees for scheduling benchmarks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build trees of a target size under a shape heuristic (boms_fixed_nodes)
    Fixed {
        /// Batch configuration file
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
    },
    /// Build trees of an exact size with bounded fan-out (boms_bounded_children)
    Bounded {
        /// Batch configuration file
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    match &cli.log_level {
        Some(level) => logging::init_with_default(level),
        None => logging::init(),
    }

    if let Err(e) = run(&cli) {
        error!("{e:#}");
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let (mode, path) = match &cli.command {
        Commands::Fixed { config } => ("fixed", config),
        Commands::Bounded { config } => ("bounded", config),
    };

    let config = BatchConfig::from_file(path)
        .with_context(|| format!("loading configuration {}", path.display()))?;
    if config.is_empty() {
        bail!("no usable entries in {}", path.display());
    }

    let summaries = match mode {
        "fixed" => {
            if config.fixed.is_empty() {
                bail!("no usable boms_fixed_nodes entries in {}", path.display());
            }
            run_fixed(&config)
        }
        _ => {
            if config.bounded.is_empty() {
                bail!("no usable boms_bounded_children entries in {}", path.display());
            }
            run_bounded(&config)
        }
    };

    report(mode, &summaries);
    Ok(())
}

fn report(mode: &str, summaries: &[RunSummary]) {
    for summary in summaries {
        info!(
            mode,
            run_dir = %summary.run_dir.display(),
            written = summary.written.len(),
            failed = summary.failed,
            undersized = summary.undersized,
            "entry finished"
        );
        println!(
            "{}: {} tree(s) written, {} failed, {} undersized",
            summary.run_dir.display(),
            summary.written.len(),
            summary.failed,
            summary.undersized
        );
    }
}
