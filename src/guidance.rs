//! Guidance network: a tiny feed-forward scorer for expression trees.
//!
//! The network maps a fixed feature vector extracted from a tree to a score
//! in `(0, 1)`. It is trained without gradients: when a prediction misses
//! its target, weights are randomly perturbed by an amount proportional to
//! the error. The goal is a cheap, deterministic heuristic that can bias
//! search, not an accurate model.
//!
//! ```text
//!   Expr ──featurize──▶ [f64; 9] ──forward──▶ ReLU … ReLU ──▶ sigmoid ──▶ score
//! ```

mod features;
mod network;

pub use features::{featurize, FEATURE_COUNT};
pub use network::{Activation, GuidanceNetwork, Layer, MUTATION_PROBABILITY, TRAIN_TOLERANCE};

use thiserror::Error;

/// Errors raised by the guidance network.
#[derive(Debug, Error)]
pub enum GuidanceError {
    /// Layer sizes are unusable (fewer than two, or a zero width).
    #[error("invalid architecture {0:?}: need at least two non-zero layer sizes")]
    InvalidArchitecture(Vec<usize>),
    /// Input width does not match the first layer.
    #[error("expected {expected} inputs, got {actual}")]
    InputSize {
        /// Width of the input layer.
        expected: usize,
        /// Width supplied by the caller.
        actual: usize,
    },
    /// Deserialized parameters disagree with the declared architecture.
    #[error("layer {layer}: {reason}")]
    Shape {
        /// Index of the offending layer.
        layer: usize,
        /// What disagreed.
        reason: String,
    },
    /// Serialized form is not valid JSON for a network.
    #[error("invalid network encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}
