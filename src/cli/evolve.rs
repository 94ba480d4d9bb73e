//! CLI command for starting an evolution run.

#![allow(clippy::needless_pass_by_value)]

use super::scenario::{GenerationReport, Run};
use super::CliError;
use evoscope::RunConfig;
use std::path::{Path, PathBuf};

/// Command-line overrides applied on top of the configuration file.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) seed: Option<u32>,
    pub(crate) generations: Option<u64>,
    pub(crate) population: Option<usize>,
}

/// Execute the evolve command.
pub(crate) fn execute(
    config: Option<PathBuf>,
    overrides: Overrides,
    checkpoint: PathBuf,
    progress: bool,
) -> Result<(), CliError> {
    let mut config = match &config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if let Some(generations) = overrides.generations {
        config.generations = generations;
    }
    if let Some(population) = overrides.population {
        config.population_size = population;
    }
    config.validate()?;

    println!("Starting evolution:");
    println!("  Seed: {}", config.seed);
    println!("  Population: {}", config.population_size);
    println!("  Generations: {}", config.generations);
    println!("  Scenario: {}", config.scenario);
    println!("  Checkpoint: {}", checkpoint.display());
    println!();

    let generations = config.generations;
    let mut run = Run::new(config);
    let last = run.drive(generations, &checkpoint, progress)?;
    print_results(&run, last.as_ref(), &checkpoint);
    Ok(())
}

/// Print the end-of-run summary shared by `evolve` and `resume`.
pub(crate) fn print_results(run: &Run, last: Option<&GenerationReport>, checkpoint: &Path) {
    println!();
    println!("Evolution complete!");
    println!("  Generation: {}", run.generation());
    if let Some(report) = last {
        println!("  Mean fitness: {:.4}", report.stats.mean_fitness);
        println!("  Complexity variance: {:.4}", report.diversity);
    }
    if let Some(champion) = run.champion() {
        println!(
            "  Best solver: {} (fitness {:.4}, generation {})",
            champion.solver, champion.fitness, champion.generation
        );
    }
    println!("  Checkpoint: {}", checkpoint.display());
    println!("  Checkpoint interval: {}", run.config().checkpoint_interval);
}
