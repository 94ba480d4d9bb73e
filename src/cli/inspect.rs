//! CLI command for validating and summarising a snapshot.

#![allow(clippy::needless_pass_by_value)]

use super::scenario::{load_snapshot, Payload};
use super::CliError;
use std::path::PathBuf;

/// Execute the inspect command.
pub(crate) fn execute(snapshot: PathBuf, json: bool) -> Result<(), CliError> {
    let loaded = load_snapshot(&snapshot)?;
    if json {
        println!("{}", loaded.to_json_pretty()?);
        return Ok(());
    }

    let meta = &loaded.meta;
    let store = &loaded.store;
    println!("Snapshot: {}", snapshot.display());
    println!("  Version: {}", meta.version);
    println!("  Timestamp: {} ms", meta.timestamp);
    println!("  Scenario: {}", meta.scenario_id);
    println!();
    println!("Scope:");
    println!("  Seed: {:#010x}", store.scope.seed);
    println!("  Tick: {}", store.scope.tick);
    println!("  Ids issued: {}", store.scope.id_counter);
    println!("  Stream state: {:#010x}", store.scope.rng_state);
    println!();
    println!("Store:");
    println!(
        "  Control: U={} K={} sigma={}",
        store.control.u, store.control.k, store.control.sigma
    );
    println!(
        "  State: D={} X={} V={}",
        store.state.d, store.state.x, store.state.v
    );
    println!(
        "  Evolution: mutationRate={} populationSize={}",
        store.evolution.mutation_rate, store.evolution.population_size
    );
    println!("  Speed: {}x{}", store.speed, if store.paused { " (paused)" } else { "" });
    println!();
    println!("Payload: {} bytes", loaded.scenario_data.len());

    // Payloads written by `evolve` get a short summary; others are opaque.
    if let Ok(payload) = serde_json::from_str::<Payload>(&loaded.scenario_data) {
        println!("  Generation: {}", payload.generation);
        println!("  Genomes: {}", payload.population.len());
        if let Some(champion) = payload.champion {
            println!(
                "  Best solver: {} (fitness {:.4})",
                champion.solver, champion.fitness
            );
        }
    }
    Ok(())
}
