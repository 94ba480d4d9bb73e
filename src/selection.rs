//! Tournament selection with elitism.
//!
//! Fitness is "higher is better". All draws come from the run's
//! [`RandomStream`], so selection replays with the rest of a run.

// Statistics divide by population size
#![allow(clippy::cast_precision_loss)]

use crate::rng::RandomStream;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Configuration for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Number of individuals competing in each tournament.
    pub tournament_size: usize,
    /// Number of elite individuals carried over unchanged.
    pub elite_count: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            tournament_size: 5,
            elite_count: 2,
        }
    }
}

/// Indices chosen for the next generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    /// Elite individuals, best first.
    pub elite_indices: Vec<usize>,
    /// Parent pairs; each pair yields one child.
    pub parent_pairs: Vec<(usize, usize)>,
}

/// Choose elites and enough parent pairs to refill `target_size` slots.
///
/// Draws: two tournaments per pair, pairs in order.
#[must_use]
pub fn select_parents(
    fitness: &[f64],
    config: &SelectionConfig,
    target_size: usize,
    rng: &mut RandomStream,
) -> SelectionResult {
    let elite_count = config.elite_count.min(fitness.len()).min(target_size);
    let elite_indices = select_elite(fitness, elite_count);
    let pairs_needed = if fitness.is_empty() {
        0
    } else {
        target_size - elite_count
    };
    let parent_pairs = (0..pairs_needed)
        .map(|_| {
            let a = tournament_select(fitness, config.tournament_size, rng);
            let b = tournament_select(fitness, config.tournament_size, rng);
            (a, b)
        })
        .collect();
    SelectionResult {
        elite_indices,
        parent_pairs,
    }
}

/// The `count` fittest indices, best first; ties keep population order.
#[must_use]
pub fn select_elite(fitness: &[f64], count: usize) -> Vec<usize> {
    let mut indexed: Vec<(usize, f64)> = fitness.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    indexed.into_iter().take(count).map(|(i, _)| i).collect()
}

/// Sample `k` individuals with replacement and return the fittest.
///
/// Earlier entrants win ties. Returns 0 for an empty population.
pub fn tournament_select(fitness: &[f64], k: usize, rng: &mut RandomStream) -> usize {
    if fitness.is_empty() {
        return 0;
    }
    let k = k.clamp(1, fitness.len());
    let mut best = rng.index(fitness.len());
    for _ in 1..k {
        let challenger = rng.index(fitness.len());
        if fitness[challenger] > fitness[best] {
            best = challenger;
        }
    }
    best
}

/// Summary statistics of one generation's fitness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionStats {
    /// Mean fitness.
    pub mean_fitness: f64,
    /// Best fitness.
    pub best_fitness: f64,
    /// Worst fitness.
    pub worst_fitness: f64,
    /// Standard deviation of fitness.
    pub fitness_std: f64,
}

impl SelectionStats {
    /// Compute statistics; all zero for an empty slice.
    #[must_use]
    pub fn from_fitness(fitness: &[f64]) -> Self {
        if fitness.is_empty() {
            return Self::default();
        }
        let n = fitness.len() as f64;
        let mean = fitness.iter().sum::<f64>() / n;
        let best = fitness.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let worst = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let variance = fitness.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean_fitness: mean,
            best_fitness: best,
            worst_fitness: worst,
            fitness_std: variance.sqrt(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_tournament_prefers_fitter() {
        let mut rng = RandomStream::new(42);
        let fitness = [0.1, 0.5, 0.9, 0.2, 0.8];
        let mut counts = [0usize; 5];
        for _ in 0..1000 {
            counts[tournament_select(&fitness, 3, &mut rng)] += 1;
        }
        let max_idx = counts.iter().enumerate().max_by_key(|(_, c)| **c).unwrap().0;
        assert_eq!(max_idx, 2);
    }

    #[test]
    fn test_tournament_of_one_is_uniform_draw() {
        let fitness = [0.1, 0.5, 0.9];
        let mut a = RandomStream::new(3);
        let mut b = RandomStream::new(3);
        for _ in 0..20 {
            assert_eq!(tournament_select(&fitness, 1, &mut a), b.index(3));
        }
    }

    #[test]
    fn test_elite_order_and_ties() {
        assert_eq!(select_elite(&[0.3, 0.9, 0.1, 0.8, 0.5], 2), vec![1, 3]);
        assert_eq!(select_elite(&[0.5, 0.5, 0.5], 2), vec![0, 1]);
    }

    #[test]
    fn test_select_parents_fills_target() {
        let mut rng = RandomStream::new(123);
        let fitness: Vec<f64> = (1..=10).map(|i| f64::from(i) / 10.0).collect();
        let config = SelectionConfig {
            tournament_size: 3,
            elite_count: 2,
        };
        let result = select_parents(&fitness, &config, 10, &mut rng);
        assert_eq!(result.elite_indices, vec![9, 8]);
        assert_eq!(result.parent_pairs.len(), 8);
        assert!(result
            .parent_pairs
            .iter()
            .all(|&(a, b)| a < 10 && b < 10));
    }

    #[test]
    fn test_empty_population() {
        let mut rng = RandomStream::new(1);
        let result = select_parents(&[], &SelectionConfig::default(), 4, &mut rng);
        assert!(result.elite_indices.is_empty());
        assert!(result.parent_pairs.is_empty());
        assert_eq!(rng.state(), 1);
    }

    #[test]
    fn test_stats() {
        let stats = SelectionStats::from_fitness(&[1.0, 3.0]);
        assert_eq!(stats.mean_fitness, 2.0);
        assert_eq!(stats.best_fitness, 3.0);
        assert_eq!(stats.worst_fitness, 1.0);
        assert_eq!(stats.fitness_std, 1.0);
        assert_eq!(SelectionStats::from_fitness(&[]), SelectionStats::default());
    }
}
