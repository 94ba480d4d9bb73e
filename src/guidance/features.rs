//! Tree feature extraction.

// Counts become normalised floats
#![allow(clippy::cast_precision_loss)]

use crate::gp::{BinOp, Expr};

/// Width of the feature vector produced by [`featurize`].
pub const FEATURE_COUNT: usize = 3 + BinOp::ALL.len();

const DEPTH_SCALE: f64 = 10.0;
const NODE_SCALE: f64 = 50.0;
const VARIABLE_SCALE: f64 = 20.0;
const OPERATOR_SCALE: f64 = 10.0;

/// Extract the normalised feature vector of a tree in one traversal.
///
/// Order: depth/10, nodes/50, variable leaves/20, then the count of each
/// operator in [`BinOp::ALL`] order divided by 10. Every entry is clamped to
/// `[0, 1]`.
#[must_use]
pub fn featurize(tree: &Expr) -> [f64; FEATURE_COUNT] {
    let mut depth = 0usize;
    let mut nodes = 0usize;
    let mut variables = 0usize;
    let mut ops = [0usize; BinOp::ALL.len()];
    tree.visit(&mut |node, level| {
        nodes += 1;
        depth = depth.max(level);
        match node {
            Expr::Var(_) => variables += 1,
            Expr::Op(op, _, _) => ops[op.index()] += 1,
            Expr::Const(_) => {}
        }
    });

    let mut features = [0.0; FEATURE_COUNT];
    features[0] = depth as f64 / DEPTH_SCALE;
    features[1] = nodes as f64 / NODE_SCALE;
    features[2] = variables as f64 / VARIABLE_SCALE;
    for (slot, count) in features[3..].iter_mut().zip(ops) {
        *slot = count as f64 / OPERATOR_SCALE;
    }
    for f in &mut features {
        *f = f.clamp(0.0, 1.0);
    }
    features
}
