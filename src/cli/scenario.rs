//! Demo scenario: symbolic regression of `x² + x`.
//!
//! Each generation:
//!
//! ```text
//! tick ─▶ fitness (parallel) ─▶ guidance training ─▶ selection
//!      ─▶ elites + crossover/mutate offspring ─▶ next population
//! ```
//!
//! Fitness is computed in parallel but collected in population order, and
//! every random draw goes through the run scope in a fixed order, so a run
//! resumed from a checkpoint continues exactly as if never interrupted.

// Generation counts and sizes feed float statistics
#![allow(clippy::cast_precision_loss)]

use super::CliError;
use evoscope::genome::population_diversity;
use evoscope::gp::{Bindings, Expr};
use evoscope::guidance::{featurize, FEATURE_COUNT};
use evoscope::selection::{select_parents, SelectionStats};
use evoscope::snapshot::EvolutionParams;
use evoscope::{
    create_snapshot, parse_snapshot, Genome, GenomeFactory, RunConfig, RunScope, Snapshot, Store,
};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Points at which candidate solvers are compared with the target.
pub(crate) const SAMPLE_POINTS: [f64; 9] = [-2.0, -1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5, 2.0];

/// Learning rate of the per-generation guidance training pass.
const GUIDANCE_LEARNING_RATE: f64 = 0.5;

fn target(x: f64) -> f64 {
    x * x + x
}

/// Fitness in `[0, 1]`: `1 / (1 + mean absolute error)`; 1 is a perfect fit.
pub(crate) fn fitness(solver: &Expr) -> f64 {
    let total: f64 = SAMPLE_POINTS
        .iter()
        .map(|&x| (solver.eval(&Bindings::with_x(x)) - target(x)).abs())
        .sum();
    let mae = total / SAMPLE_POINTS.len() as f64;
    if mae.is_finite() { 1.0 / (1.0 + mae) } else { 0.0 }
}

/// Best solver seen so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Champion {
    pub(crate) solver: Expr,
    pub(crate) fitness: f64,
    pub(crate) generation: u64,
}

/// Scenario state carried in a snapshot's `scenarioData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Payload {
    pub(crate) config: RunConfig,
    pub(crate) generation: u64,
    pub(crate) population: Vec<Genome>,
    pub(crate) champion: Option<Champion>,
}

/// Outcome of one generation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GenerationReport {
    pub(crate) generation: u64,
    pub(crate) stats: SelectionStats,
    pub(crate) diversity: f64,
}

/// A running symbolic-regression population.
#[derive(Debug)]
pub(crate) struct Run {
    config: RunConfig,
    scope: RunScope,
    factory: GenomeFactory,
    population: Vec<Genome>,
    generation: u64,
    champion: Option<Champion>,
}

impl Run {
    /// Seed a fresh population.
    pub(crate) fn new(config: RunConfig) -> Self {
        let mut scope = RunScope::new(config.seed);
        let factory = GenomeFactory::new(config.genome.clone());
        let population = (0..config.population_size)
            .map(|_| factory.create_random(&mut scope))
            .collect();
        info!(
            seed = config.seed,
            population = config.population_size,
            "seeded population"
        );
        Self {
            config,
            scope,
            factory,
            population,
            generation: 0,
            champion: None,
        }
    }

    /// Rebuild a run from a checkpoint.
    pub(crate) fn from_snapshot(snapshot: &Snapshot) -> Result<Self, CliError> {
        let payload: Payload = serde_json::from_str(&snapshot.scenario_data)?;
        payload.config.validate()?;
        if payload.population.len() != payload.config.population_size {
            return Err(CliError::new(format!(
                "checkpoint holds {} genomes, configuration expects {}",
                payload.population.len(),
                payload.config.population_size
            )));
        }
        let factory = GenomeFactory::new(payload.config.genome.clone());
        info!(
            generation = payload.generation,
            tick = snapshot.store.scope.tick,
            "resumed population"
        );
        Ok(Self {
            config: payload.config,
            scope: RunScope::restore(&snapshot.store.scope),
            factory,
            population: payload.population,
            generation: payload.generation,
            champion: payload.champion,
        })
    }

    pub(crate) const fn config(&self) -> &RunConfig {
        &self.config
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) const fn champion(&self) -> Option<&Champion> {
        self.champion.as_ref()
    }

    /// Advance one generation.
    pub(crate) fn step(&mut self) -> GenerationReport {
        self.scope.tick();
        let fitness: Vec<f64> = self
            .population
            .par_iter()
            .map(|g| fitness(&g.solver))
            .collect();
        self.train_guidance(&fitness);

        let stats = SelectionStats::from_fitness(&fitness);
        self.record_champion(&fitness);

        let size = self.population.len();
        let selection = select_parents(&fitness, &self.config.selection, size, self.scope.rng());
        let mut next: Vec<Genome> = selection
            .elite_indices
            .iter()
            .map(|&i| self.population[i].clone())
            .collect();
        for (a, b) in selection.parent_pairs {
            let child =
                self.factory
                    .crossover(&self.population[a], &self.population[b], &mut self.scope);
            next.push(self.factory.mutate(&child, &mut self.scope));
        }
        self.population = next;
        self.generation += 1;

        let diversity = population_diversity(&self.population);
        debug!(
            generation = self.generation,
            best = stats.best_fitness,
            mean = stats.mean_fitness,
            diversity,
            "generation complete"
        );
        GenerationReport {
            generation: self.generation,
            stats,
            diversity,
        }
    }

    /// Teach each genome's network to predict its fitness from its template.
    fn train_guidance(&mut self, fitness: &[f64]) {
        let rng = self.scope.rng();
        for (genome, &score) in self.population.iter_mut().zip(fitness) {
            if let Some(net) = genome.guidance.as_mut()
                && net.input_size() == FEATURE_COUNT
            {
                net.train(&featurize(&genome.template), score, GUIDANCE_LEARNING_RATE, rng);
            }
        }
    }

    fn record_champion(&mut self, fitness: &[f64]) {
        let best = fitness
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, &f)| match best {
                Some((_, b)) if b >= f => best,
                _ => Some((i, f)),
            });
        let Some((index, score)) = best else {
            return;
        };
        if self.champion.as_ref().is_none_or(|c| score > c.fitness) {
            let solver = self.population[index].solver.clone();
            info!(generation = self.generation + 1, fitness = score, %solver, "new champion");
            self.champion = Some(Champion {
                solver,
                fitness: score,
                generation: self.generation + 1,
            });
        }
    }

    /// Capture the run as a snapshot.
    pub(crate) fn snapshot(&self) -> Result<Snapshot, CliError> {
        let payload = Payload {
            config: self.config.clone(),
            generation: self.generation,
            population: self.population.clone(),
            champion: self.champion.clone(),
        };
        let mut store = Store::with_scope(self.scope.state());
        store.evolution = EvolutionParams {
            mutation_rate: self.config.genome.solver_mutation_rate,
            population_size: u32::try_from(self.population.len()).unwrap_or(u32::MAX),
        };
        store.state.d = population_diversity(&self.population).clamp(0.0, 1.0);
        store.state.x = self.champion.as_ref().map_or(0.0, |c| c.fitness);
        Ok(create_snapshot(
            self.config.scenario,
            &store,
            &serde_json::to_string(&payload)?,
        ))
    }

    /// Run `generations` more generations, checkpointing to `checkpoint`
    /// every `checkpoint_interval` generations and once at the end.
    pub(crate) fn drive(
        &mut self,
        generations: u64,
        checkpoint: &Path,
        progress: bool,
    ) -> Result<Option<GenerationReport>, CliError> {
        let bar = if progress {
            let bar = ProgressBar::new(generations);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} generations {msg}",
                )
                .map_err(|e| CliError::new(format!("progress bar: {e}")))?
                .progress_chars("=>-"),
            );
            Some(bar)
        } else {
            None
        };

        let interval = self.config.checkpoint_interval;
        let mut last = None;
        for _ in 0..generations {
            let report = self.step();
            if let Some(bar) = &bar {
                bar.set_message(format!("best {:.4}", report.stats.best_fitness));
                bar.inc(1);
            }
            if interval > 0 && report.generation.is_multiple_of(interval) {
                self.write_checkpoint(checkpoint)?;
            }
            last = Some(report);
        }
        if let Some(bar) = bar {
            bar.finish_with_message("done");
        }
        self.write_checkpoint(checkpoint)?;
        Ok(last)
    }

    fn write_checkpoint(&self, path: &Path) -> Result<(), CliError> {
        let json = self.snapshot()?.to_json()?;
        fs::write(path, json)
            .map_err(|e| CliError::new(format!("cannot write {}: {e}", path.display())))?;
        info!(generation = self.generation, path = %path.display(), "checkpoint written");
        Ok(())
    }
}

/// Read and decode a snapshot file.
pub(crate) fn load_snapshot(path: &Path) -> Result<Snapshot, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|e| CliError::new(format!("cannot load {}: {e}", path.display())))?;
    parse_snapshot(&text).map_err(|e| CliError::new(format!("cannot load {}: {e}", path.display())))
}
