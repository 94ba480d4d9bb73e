//! Genomes and the factory that creates, mutates and crosses them.
//!
//! A [`Genome`] pairs a *solver* tree (the candidate answer) with a
//! *template* tree (a structural pattern), plus evolvable search knobs: a
//! [`MutationBias`], per-genome [`OperatorWeights`] and an optional
//! [`GuidanceNetwork`].
//!
//! Every factory operation takes the run's [`RunScope`] and consumes its
//! stream in a fixed, documented order, so a lineage replays exactly from a
//! seed. Parents are never modified.

// Node counts become complexity scores
#![allow(clippy::cast_precision_loss)]

use crate::gp::{crossover, Expr, MutationConfig, OperatorWeights, StructuralMutator, TreeMutator};
use crate::guidance::{featurize, GuidanceNetwork, FEATURE_COUNT};
use crate::rng::RandomStream;
use crate::scope::RunScope;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Prefix of genome ids.
pub const GENOME_ID_PREFIX: &str = "genome";

/// Four scalars in `[0, 1]` describing a genome's search disposition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationBias {
    /// Appetite for novel structure.
    pub explore: f64,
    /// Appetite for refining what works.
    pub exploit: f64,
    /// Preference for smaller trees.
    pub simplify: f64,
    /// Preference for variable-rich trees.
    pub generalize: f64,
}

impl Default for MutationBias {
    fn default() -> Self {
        Self {
            explore: 0.5,
            exploit: 0.5,
            simplify: 0.5,
            generalize: 0.5,
        }
    }
}

impl MutationBias {
    /// Draw all four fields uniformly from `[0, 1)`, in field order.
    pub fn random(rng: &mut RandomStream) -> Self {
        Self {
            explore: rng.next(),
            exploit: rng.next(),
            simplify: rng.next(),
            generalize: rng.next(),
        }
    }

    /// Nudge each field, in order, by a uniform value in `[-step, step)`,
    /// clamping to `[0, 1]`.
    #[must_use]
    pub fn nudged(&self, step: f64, rng: &mut RandomStream) -> Self {
        let mut nudge = |v: f64| (v + rng.next_range(-step, step)).clamp(0.0, 1.0);
        Self {
            explore: nudge(self.explore),
            exploit: nudge(self.exploit),
            simplify: nudge(self.simplify),
            generalize: nudge(self.generalize),
        }
    }

    /// Per-field mean.
    #[must_use]
    pub fn average(&self, other: &Self) -> Self {
        Self {
            explore: (self.explore + other.explore) / 2.0,
            exploit: (self.exploit + other.exploit) / 2.0,
            simplify: (self.simplify + other.simplify) / 2.0,
            generalize: (self.generalize + other.generalize) / 2.0,
        }
    }
}

/// An evolvable individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genome {
    /// Unique id issued by the run scope.
    pub id: String,
    /// Candidate solution.
    pub solver: Expr,
    /// Structural pattern.
    pub template: Expr,
    /// Search disposition.
    pub bias: MutationBias,
    /// Evolvable structural operator mix.
    pub operator_weights: OperatorWeights,
    /// Optional learned heuristic.
    #[serde(default)]
    pub guidance: Option<GuidanceNetwork>,
    /// Size-based score in `[0, 1]`.
    pub complexity: f64,
}

impl Genome {
    /// Guidance network score of the solver tree.
    ///
    /// `None` without a network, or if the network does not take the
    /// standard feature vector.
    #[must_use]
    pub fn guidance_score(&self) -> Option<f64> {
        let net = self.guidance.as_ref()?;
        net.try_predict(&featurize(&self.solver)).ok()
    }
}

/// Tunables of the genome factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeConfig {
    /// Depth cap of random solver trees.
    pub solver_depth: usize,
    /// Depth cap of random template trees.
    pub template_depth: usize,
    /// Mutation rate applied to the solver.
    pub solver_mutation_rate: f64,
    /// Mutation rate applied to the template.
    pub template_mutation_rate: f64,
    /// Maximum bias nudge per field.
    pub bias_step: f64,
    /// Maximum perturbation of one operator weight.
    pub operator_weight_step: f64,
    /// Perturbation rate of the guidance network.
    pub guidance_mutation_rate: f64,
    /// Node count at which complexity saturates.
    pub complexity_normalizer: f64,
    /// Guidance network layer widths, input first.
    pub guidance_layers: Vec<usize>,
    /// Whether new genomes carry a guidance network.
    pub with_guidance: bool,
    /// Structural operator configuration.
    pub mutation: MutationConfig,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            solver_depth: 4,
            template_depth: 3,
            solver_mutation_rate: 0.8,
            template_mutation_rate: 0.4,
            bias_step: 0.05,
            operator_weight_step: 5.0,
            guidance_mutation_rate: 0.05,
            complexity_normalizer: 50.0,
            guidance_layers: vec![FEATURE_COUNT, 8, 1],
            with_guidance: true,
            mutation: MutationConfig::default(),
        }
    }
}

/// Complexity of a solver/template pair: total node count over
/// `normalizer`, capped at 1.
#[must_use]
pub fn complexity_score(solver: &Expr, template: &Expr, normalizer: f64) -> f64 {
    if normalizer <= 0.0 || !normalizer.is_finite() {
        return 1.0;
    }
    let nodes = (solver.node_count() + template.node_count()) as f64;
    (nodes / normalizer).min(1.0)
}

/// Variance of the complexity scores of a population.
///
/// Zero for fewer than two genomes.
#[must_use]
pub fn population_diversity(population: &[Genome]) -> f64 {
    if population.len() < 2 {
        return 0.0;
    }
    let n = population.len() as f64;
    let mean = population.iter().map(|g| g.complexity).sum::<f64>() / n;
    population
        .iter()
        .map(|g| (g.complexity - mean).powi(2))
        .sum::<f64>()
        / n
}

/// Creates, mutates and crosses genomes.
///
/// The tree mutation strategy is injected at construction; there is no
/// process-wide default.
#[derive(Debug)]
pub struct GenomeFactory {
    config: GenomeConfig,
    mutator: Box<dyn TreeMutator>,
}

impl Default for GenomeFactory {
    fn default() -> Self {
        Self::new(GenomeConfig::default())
    }
}

impl GenomeFactory {
    /// Factory using the structural operators.
    #[must_use]
    pub fn new(config: GenomeConfig) -> Self {
        let mutator = Box::new(StructuralMutator::new(config.mutation));
        Self { config, mutator }
    }

    /// Factory using a substitute tree mutator.
    #[must_use]
    pub fn with_mutator(config: GenomeConfig, mutator: Box<dyn TreeMutator>) -> Self {
        Self { config, mutator }
    }

    /// Factory configuration.
    #[must_use]
    pub const fn config(&self) -> &GenomeConfig {
        &self.config
    }

    /// Complexity of a genome under this factory's normalizer.
    #[must_use]
    pub fn complexity(&self, genome: &Genome) -> f64 {
        complexity_score(&genome.solver, &genome.template, self.config.complexity_normalizer)
    }

    /// Create a random genome.
    ///
    /// Draws: id, solver tree, template tree, the four bias scalars, then
    /// the guidance network weights if enabled. Operator weights start at
    /// their defaults.
    pub fn create_random(&self, scope: &mut RunScope) -> Genome {
        let id = scope.next_id(GENOME_ID_PREFIX);
        let rng = scope.rng();
        let solver = Expr::random(rng, self.config.solver_depth);
        let template = Expr::random(rng, self.config.template_depth);
        let bias = MutationBias::random(rng);
        let guidance = if self.config.with_guidance {
            self.new_network(rng)
        } else {
            None
        };
        let complexity =
            complexity_score(&solver, &template, self.config.complexity_normalizer);
        Genome {
            id,
            solver,
            template,
            bias,
            operator_weights: OperatorWeights::default(),
            guidance,
            complexity,
        }
    }

    fn new_network(&self, rng: &mut RandomStream) -> Option<GuidanceNetwork> {
        GuidanceNetwork::new(&self.config.guidance_layers, rng)
            .inspect_err(|error| warn!(%error, "genome created without guidance network"))
            .ok()
    }

    /// Produce a mutated child.
    ///
    /// Draws: id; solver mutation; template mutation; bias nudges in field
    /// order; one operator-weight entry picked by name and perturbed (never
    /// below zero); guidance perturbation when present.
    pub fn mutate(&self, genome: &Genome, scope: &mut RunScope) -> Genome {
        let id = scope.next_id(GENOME_ID_PREFIX);
        let rng = scope.rng();
        let weights = &genome.operator_weights;
        let solver =
            self.mutator
                .mutate(&genome.solver, self.config.solver_mutation_rate, weights, rng);
        let template =
            self.mutator
                .mutate(&genome.template, self.config.template_mutation_rate, weights, rng);
        let bias = genome.bias.nudged(self.config.bias_step, rng);

        let mut operator_weights = genome.operator_weights;
        let step = self.config.operator_weight_step;
        if let Some(&name) = rng.pick(&OperatorWeights::NAMES)
            && let Some(weight) = operator_weights.get_mut(name)
        {
            *weight = (*weight + rng.next_range(-step, step)).max(0.0);
        }

        let guidance = genome.guidance.clone().map(|mut net| {
            net.mutate(self.config.guidance_mutation_rate, rng);
            net
        });

        let complexity =
            complexity_score(&solver, &template, self.config.complexity_normalizer);
        Genome {
            id,
            solver,
            template,
            bias,
            operator_weights,
            guidance,
            complexity,
        }
    }

    /// Produce a child of two parents.
    ///
    /// Draws: id; solver tree crossover (trunk from `a`); a coin for the
    /// template parent; a coin for the guidance parent. Bias and operator
    /// weights are averaged. A solver over the configured size limits is
    /// dropped in favour of `a`'s solver.
    pub fn crossover(&self, a: &Genome, b: &Genome, scope: &mut RunScope) -> Genome {
        let id = scope.next_id(GENOME_ID_PREFIX);
        let rng = scope.rng();
        let solver = Some(crossover(&a.solver, &b.solver, rng))
            .filter(|child| self.config.mutation.admits(child))
            .unwrap_or_else(|| a.solver.clone());
        let template = if rng.next_boolean() { &a.template } else { &b.template }.clone();
        let guidance = if rng.next_boolean() { &a.guidance } else { &b.guidance }.clone();
        let complexity =
            complexity_score(&solver, &template, self.config.complexity_normalizer);
        Genome {
            id,
            solver,
            template,
            bias: a.bias.average(&b.bias),
            operator_weights: a.operator_weights.average(&b.operator_weights),
            guidance,
            complexity,
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::gp::{BinOp, GuardedMutator, RewriteError, Variable};
    use std::time::Duration;

    fn scope() -> RunScope {
        RunScope::new(42)
    }

    #[test]
    fn test_create_random_draw_order() {
        let factory = GenomeFactory::default();
        let genome = factory.create_random(&mut scope());

        let mut rng = RandomStream::new(42);
        let solver = Expr::random(&mut rng, 4);
        let template = Expr::random(&mut rng, 3);
        let bias = MutationBias::random(&mut rng);
        let net = GuidanceNetwork::new(&[FEATURE_COUNT, 8, 1], &mut rng).unwrap();

        assert_eq!(genome.id, "genome-0000002a-1");
        assert_eq!(genome.solver, solver);
        assert_eq!(genome.template, template);
        assert_eq!(genome.bias, bias);
        assert_eq!(genome.operator_weights, OperatorWeights::default());
        assert_eq!(genome.guidance, Some(net));
    }

    #[test]
    fn test_same_seed_same_lineage() {
        let factory = GenomeFactory::default();
        let run = || {
            let mut scope = scope();
            let a = factory.create_random(&mut scope);
            let b = factory.create_random(&mut scope);
            let c = factory.crossover(&a, &b, &mut scope);
            factory.mutate(&c, &mut scope)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_mutate_keeps_parent_and_bounds() {
        let factory = GenomeFactory::default();
        let mut scope = scope();
        let mut genome = factory.create_random(&mut scope);
        genome.bias = MutationBias {
            explore: 0.0,
            exploit: 1.0,
            simplify: 0.0,
            generalize: 1.0,
        };
        genome.operator_weights.point = 0.0;
        let parent = genome.clone();
        let _ = factory.mutate(&genome, &mut scope);
        assert_eq!(genome, parent);
        for _ in 0..200 {
            let child = factory.mutate(&genome, &mut scope);
            assert_ne!(child.id, genome.id);
            for v in [
                child.bias.explore,
                child.bias.exploit,
                child.bias.simplify,
                child.bias.generalize,
            ] {
                assert!((0.0..=1.0).contains(&v));
            }
            for name in OperatorWeights::NAMES {
                assert!(child.operator_weights.get(name).unwrap() >= 0.0);
            }
            assert!(child.solver.is_well_formed());
            assert_eq!(child.complexity, factory.complexity(&child));
            genome = child;
        }
    }

    #[test]
    fn test_mutate_changes_exactly_one_weight() {
        let factory = GenomeFactory::default();
        let mut scope = scope();
        let genome = factory.create_random(&mut scope);
        let child = factory.mutate(&genome, &mut scope);
        let changed = OperatorWeights::NAMES
            .iter()
            .filter(|n| child.operator_weights.get(n) != genome.operator_weights.get(n))
            .count();
        assert!(changed <= 1);
    }

    #[test]
    fn test_crossover_averages_and_inherits() {
        let factory = GenomeFactory::default();
        let mut scope = scope();
        let a = factory.create_random(&mut scope);
        let mut b = factory.create_random(&mut scope);
        b.operator_weights.grow = 60.0;
        let child = factory.crossover(&a, &b, &mut scope);
        assert_eq!(child.bias, a.bias.average(&b.bias));
        assert_eq!(child.operator_weights.grow, 40.0);
        assert!(child.template == a.template || child.template == b.template);
        assert!(child.guidance == a.guidance || child.guidance == b.guidance);
        assert_eq!(child.id, "genome-0000002a-3");
    }

    #[test]
    fn test_crossover_drops_oversized_solver() {
        let factory = GenomeFactory::default();
        let mut scope = scope();
        let mut a = factory.create_random(&mut scope);
        let mut b = factory.create_random(&mut scope);
        a.solver = Expr::Var(Variable::X);
        b.solver = (0..40).fold(Expr::Const(1.0), |t, _| {
            Expr::op(BinOp::Add, t, Expr::Var(Variable::Y))
        });
        assert!(!factory.config().mutation.admits(&b.solver));

        let child = factory.crossover(&a, &b, &mut scope);
        assert!(factory.config().mutation.admits(&child.solver));
        assert!(child.solver.node_count() < b.solver.node_count());
    }

    #[test]
    fn test_without_guidance() {
        let config = GenomeConfig {
            with_guidance: false,
            ..GenomeConfig::default()
        };
        let factory = GenomeFactory::new(config);
        let genome = factory.create_random(&mut scope());
        assert!(genome.guidance.is_none());
        assert!(genome.guidance_score().is_none());
    }

    #[test]
    fn test_invalid_guidance_layers_skip_network() {
        let config = GenomeConfig {
            guidance_layers: vec![FEATURE_COUNT],
            ..GenomeConfig::default()
        };
        let genome = GenomeFactory::new(config).create_random(&mut scope());
        assert!(genome.guidance.is_none());
    }

    #[test]
    fn test_guidance_score_in_unit_interval() {
        let genome = GenomeFactory::default().create_random(&mut scope());
        let score = genome.guidance_score().unwrap();
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn test_complexity_score() {
        let solver: Expr = "x + 1".parse().unwrap();
        let template: Expr = "y".parse().unwrap();
        assert_eq!(complexity_score(&solver, &template, 50.0), 4.0 / 50.0);
        assert_eq!(complexity_score(&solver, &template, 2.0), 1.0);
        assert_eq!(complexity_score(&solver, &template, 0.0), 1.0);
    }

    #[test]
    fn test_population_diversity() {
        let factory = GenomeFactory::default();
        let mut scope = scope();
        let mut a = factory.create_random(&mut scope);
        let mut b = a.clone();
        assert_eq!(population_diversity(&[]), 0.0);
        assert_eq!(population_diversity(std::slice::from_ref(&a)), 0.0);
        assert_eq!(population_diversity(&[a.clone(), b.clone()]), 0.0);
        a.complexity = 0.25;
        b.complexity = 0.75;
        assert_eq!(population_diversity(&[a, b]), 0.0625);
    }

    #[test]
    fn test_injected_mutator_is_used() {
        let rewriter = |_: &str, _: Duration| -> Result<String, RewriteError> { Ok("n".to_string()) };
        let guarded = GuardedMutator::new(rewriter, MutationConfig::default());
        let config = GenomeConfig {
            solver_mutation_rate: 1.0,
            template_mutation_rate: 1.0,
            ..GenomeConfig::default()
        };
        let factory = GenomeFactory::with_mutator(config, Box::new(guarded));
        let mut scope = scope();
        let genome = factory.create_random(&mut scope);
        let child = factory.mutate(&genome, &mut scope);
        assert_eq!(child.solver.to_string(), "n");
        assert_eq!(child.template.to_string(), "n");
    }
}
