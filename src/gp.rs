//! Genetic programming over arithmetic expression trees.
//!
//! Trees are immutable values: every operator returns a fresh tree and never
//! touches its inputs. All randomness comes from a caller-supplied
//! [`RandomStream`](crate::rng::RandomStream), so a given stream state always
//! yields the same offspring.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   TreeMutator (strategy seam)       │
//! │   Structural │ Guarded(external)    │
//! ├─────────────────────────────────────┤
//! │ Point │ Subtree │ Grow │ Shrink     │
//! │            Crossover                │
//! ├─────────────────────────────────────┤
//! │   Expr (preorder-indexed tree)      │
//! │   Text form (render / parse)        │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use evoscope::gp::{crossover, Bindings, Expr};
//! use evoscope::rng::RandomStream;
//!
//! let mut rng = RandomStream::new(42);
//! let a = Expr::random(&mut rng, 4);
//! let b: Expr = "x * x + x".parse().unwrap();
//! let child = crossover(&a, &b, &mut rng);
//! assert!(child.is_well_formed());
//! let _ = child.eval(&Bindings::with_x(2.0));
//! ```

mod crossover;
mod expr;
mod mutation;
mod strategy;
mod text;

pub use crossover::{crossover, crossover_at};
pub use expr::{
    BinOp, Bindings, Expr, Variable, LEAF_PROBABILITY, MAX_CONSTANT, MAX_DEPTH, MIN_CONSTANT,
};
pub use mutation::{
    apply_operator, grow_mutation, mutate, point_mutation, shrink_mutation, subtree_mutation,
    MutationConfig, OperatorWeights, StructuralOp,
};
pub use strategy::{
    ExternalRewriter, GuardedMutator, ProposalError, RewriteError, StructuralMutator,
    TreeMutator, DEFAULT_REWRITE_TIMEOUT,
};
pub use text::ParseError;
