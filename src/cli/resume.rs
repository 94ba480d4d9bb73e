//! CLI command for continuing a checkpointed run.

#![allow(clippy::needless_pass_by_value)]

use super::evolve::print_results;
use super::scenario::{load_snapshot, Run};
use super::CliError;
use std::path::PathBuf;

/// Execute the resume command.
///
/// Runs `generations` more generations (the configured count if absent) and
/// checkpoints to `checkpoint`, or back over the input snapshot.
pub(crate) fn execute(
    snapshot: PathBuf,
    generations: Option<u64>,
    checkpoint: Option<PathBuf>,
    progress: bool,
) -> Result<(), CliError> {
    let loaded = load_snapshot(&snapshot)?;
    let mut run = Run::from_snapshot(&loaded)?;
    let generations = generations.unwrap_or(run.config().generations);
    let checkpoint = checkpoint.unwrap_or(snapshot);

    println!(
        "Resuming evolution at generation {} for {generations} more generations",
        run.generation()
    );

    let last = run.drive(generations, &checkpoint, progress)?;
    print_results(&run, last.as_ref(), &checkpoint);
    Ok(())
}
