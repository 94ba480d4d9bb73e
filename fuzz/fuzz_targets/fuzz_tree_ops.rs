#![no_main]

use arbitrary::Arbitrary;
use evoscope::gp::{crossover, mutate, Expr, MutationConfig, OperatorWeights};
use evoscope::RandomStream;
use libfuzzer_sys::fuzz_target;

/// Structured input for operator fuzzing.
#[derive(Arbitrary, Debug)]
struct TreeOpsInput {
    /// Stream seed.
    seed: u32,
    /// Depth cap for the initial trees.
    depth: u8,
    /// Raw operator weights; negatives and zeros are allowed.
    weights: [f64; 4],
    /// Mutation rate; values outside `[0, 1]` are allowed.
    rate: f64,
    /// Number of mutate/crossover rounds.
    rounds: u8,
}

fuzz_target!(|input: TreeOpsInput| {
    let depth = usize::from(input.depth % 8);
    let rounds = input.rounds % 8;
    let mut rng = RandomStream::new(input.seed);
    let config = MutationConfig::default();
    let weights = OperatorWeights {
        point: input.weights[0],
        subtree: input.weights[1],
        grow: input.weights[2],
        shrink: input.weights[3],
    };

    let mut a = Expr::random(&mut rng, depth);
    let mut b = Expr::random(&mut rng, depth);
    for _ in 0..rounds {
        let child = crossover(&a, &b, &mut rng);
        assert!(child.is_well_formed());
        let mutated = mutate(&child, input.rate, &weights, &config, &mut rng);
        assert!(mutated.is_well_formed());
        b = a;
        a = mutated;
    }
});
