//! Evoscope CLI - evolve, checkpoint and resume replayable GP runs.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Evoscope - deterministic genetic programming with exact replay
#[derive(Parser, Debug)]
#[command(name = "evoscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Evolve a population for the x² + x regression demo
    Evolve {
        /// TOML run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run seed (overrides the configuration)
        #[arg(short, long)]
        seed: Option<u32>,

        /// Generations to run (overrides the configuration)
        #[arg(short, long)]
        generations: Option<u64>,

        /// Population size (overrides the configuration)
        #[arg(short, long)]
        population: Option<usize>,

        /// Snapshot file written at checkpoints
        #[arg(long, default_value = "evoscope-snapshot.json")]
        checkpoint: PathBuf,

        /// Show progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Continue a run from a snapshot
    Resume {
        /// Snapshot written by `evolve` or `resume`
        #[arg(required = true)]
        snapshot: PathBuf,

        /// Additional generations (default: the configured count)
        #[arg(short, long)]
        generations: Option<u64>,

        /// Snapshot file written at checkpoints (default: the input file)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Show progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Validate a snapshot and print its contents
    Inspect {
        /// Snapshot file
        #[arg(required = true)]
        snapshot: PathBuf,

        /// Print the sanitized snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let result = match args.command {
        Commands::Evolve {
            config,
            seed,
            generations,
            population,
            checkpoint,
            progress,
        } => cli::evolve::execute(
            config,
            cli::evolve::Overrides {
                seed,
                generations,
                population,
            },
            checkpoint,
            progress,
        ),

        Commands::Resume {
            snapshot,
            generations,
            checkpoint,
            progress,
        } => cli::resume::execute(snapshot, generations, checkpoint, progress),

        Commands::Inspect { snapshot, json } => cli::inspect::execute(snapshot, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
