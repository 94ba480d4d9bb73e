//! Structural mutation operators.
//!
//! Four operators alter a tree while keeping it well formed:
//!
//! - **point**: redraw one node's value (leaf) or operator (internal node);
//! - **subtree**: replace one node's whole subtree with a fresh random tree;
//! - **grow**: wrap one node in a new operator node beside a fresh leaf
//!   (exactly two nodes added);
//! - **shrink**: collapse one non-root node (nodes strictly removed).
//!
//! [`mutate`] gates on the mutation rate and dispatches to one operator by
//! a weighted draw. Every operator returns a new tree; the input is never
//! touched. Draw order inside each operator is fixed and documented, because
//! replays depend on it.

use crate::gp::expr::{BinOp, Expr, Variable, MAX_DEPTH};
use crate::rng::RandomStream;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the structural operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Depth cap for trees generated by subtree mutation.
    pub max_subtree_depth: usize,
    /// Size above which the composite operator turns grow into shrink.
    pub max_nodes: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            max_subtree_depth: 2,
            max_nodes: 64,
        }
    }
}

impl MutationConfig {
    /// Whether `tree` fits the size limits: at most `max_nodes` nodes and
    /// no deeper than [`MAX_DEPTH`].
    #[must_use]
    pub fn admits(&self, tree: &Expr) -> bool {
        tree.node_count() <= self.max_nodes && tree.depth() <= MAX_DEPTH
    }
}

/// One of the four structural operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructuralOp {
    /// Redraw a single node.
    Point,
    /// Replace a subtree with a fresh one.
    Subtree,
    /// Wrap a node in a new operator node.
    Grow,
    /// Collapse a non-root node.
    Shrink,
}

/// Relative weights of the structural operators in [`mutate`].
///
/// Weights are relative, need not sum to anything in particular and are
/// clamped at zero. An all-zero (or non-finite) mix falls back to the
/// default 30/20/20/30 split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorWeights {
    /// Weight of point mutation.
    pub point: f64,
    /// Weight of subtree replacement.
    pub subtree: f64,
    /// Weight of grow.
    pub grow: f64,
    /// Weight of shrink.
    pub shrink: f64,
}

impl Default for OperatorWeights {
    fn default() -> Self {
        Self {
            point: 30.0,
            subtree: 20.0,
            grow: 20.0,
            shrink: 30.0,
        }
    }
}

impl OperatorWeights {
    /// Entry names, in field order.
    pub const NAMES: [&'static str; 4] = ["point", "subtree", "grow", "shrink"];

    /// Weight stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "point" => Some(self.point),
            "subtree" => Some(self.subtree),
            "grow" => Some(self.grow),
            "shrink" => Some(self.shrink),
            _ => None,
        }
    }

    /// Mutable weight stored under `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "point" => Some(&mut self.point),
            "subtree" => Some(&mut self.subtree),
            "grow" => Some(&mut self.grow),
            "shrink" => Some(&mut self.shrink),
            _ => None,
        }
    }

    /// Per-field mean of two weight sets.
    #[must_use]
    pub fn average(&self, other: &Self) -> Self {
        Self {
            point: (self.point + other.point) / 2.0,
            subtree: (self.subtree + other.subtree) / 2.0,
            grow: (self.grow + other.grow) / 2.0,
            shrink: (self.shrink + other.shrink) / 2.0,
        }
    }

    fn effective(&self) -> [(StructuralOp, f64); 4] {
        let clean = |w: f64| if w.is_finite() { w.max(0.0) } else { 0.0 };
        let entries = [
            (StructuralOp::Point, clean(self.point)),
            (StructuralOp::Subtree, clean(self.subtree)),
            (StructuralOp::Grow, clean(self.grow)),
            (StructuralOp::Shrink, clean(self.shrink)),
        ];
        let total: f64 = entries.iter().map(|(_, w)| w).sum();
        if total > 0.0 {
            entries
        } else {
            Self::default().effective()
        }
    }

    /// Choose an operator with probability proportional to its weight.
    ///
    /// Consumes exactly one draw.
    pub fn choose(&self, rng: &mut RandomStream) -> StructuralOp {
        let entries = self.effective();
        let total: f64 = entries.iter().map(|(_, w)| w).sum();
        let mut spin = rng.next() * total;
        for (op, weight) in entries {
            if spin < weight {
                return op;
            }
            spin -= weight;
        }
        // Rounding can leave a sliver past the last bucket
        entries
            .iter()
            .rev()
            .find(|(_, w)| *w > 0.0)
            .map_or(StructuralOp::Shrink, |(op, _)| *op)
    }
}

/// Point mutation.
///
/// Draws: node index, then the new value (a variable or constant of the same
/// leaf kind) or the new operator.
pub fn point_mutation(tree: &Expr, rng: &mut RandomStream) -> Expr {
    let target = rng.index(tree.node_count());
    tree.rebuild_at(target, &mut |node| match node {
        Expr::Const(_) => Expr::random_constant(rng),
        Expr::Var(_) => Expr::Var(Variable::random(rng)),
        Expr::Op(_, a, b) => Expr::Op(BinOp::random(rng), a.clone(), b.clone()),
    })
    .unwrap_or_else(|| tree.clone())
}

/// Subtree replacement.
///
/// Draws: node index, then the fresh subtree (depth capped by
/// `config.max_subtree_depth`). A result the config does not admit is
/// discarded and the input comes back unchanged; the draws are spent
/// either way.
pub fn subtree_mutation(tree: &Expr, config: &MutationConfig, rng: &mut RandomStream) -> Expr {
    let target = rng.index(tree.node_count());
    let fresh = Expr::random(rng, config.max_subtree_depth);
    tree.replace_subtree(target, &fresh)
        .filter(|child| config.admits(child))
        .unwrap_or_else(|| tree.clone())
}

/// Grow: wrap one node as a child of a new operator node.
///
/// Draws: node index, operator, sibling leaf, side (wrapped node on the left
/// when `true`). Adds exactly two nodes.
pub fn grow_mutation(tree: &Expr, rng: &mut RandomStream) -> Expr {
    let target = rng.index(tree.node_count());
    let op = BinOp::random(rng);
    let leaf = Expr::random_leaf(rng);
    let wrapped_on_left = rng.next_boolean();
    tree.rebuild_at(target, &mut |node| {
        if wrapped_on_left {
            Expr::op(op, node.clone(), leaf.clone())
        } else {
            Expr::op(op, leaf.clone(), node.clone())
        }
    })
    .unwrap_or_else(|| tree.clone())
}

/// Shrink: collapse one non-root node.
///
/// Draws: non-root node index; if that node is internal, a coin flip picks
/// which child replaces it. If it is a leaf, its parent is replaced by the
/// leaf's sibling (no further draw). Either way nodes are strictly removed.
/// Trees with fewer than two nodes come back as an unchanged clone.
pub fn shrink_mutation(tree: &Expr, rng: &mut RandomStream) -> Expr {
    let count = tree.node_count();
    if count < 2 {
        return tree.clone();
    }
    let target = 1 + rng.index(count - 1);
    let collapsed = match tree.subtree(target) {
        Some(Expr::Op(_, a, b)) => {
            let keep = if rng.next_boolean() { a } else { b };
            tree.replace_subtree(target, keep)
        }
        Some(_) => tree.parent_of(target).and_then(|parent| {
            let Some(Expr::Op(_, a, b)) = tree.subtree(parent) else {
                return None;
            };
            let sibling = if target == parent + 1 { b } else { a };
            tree.replace_subtree(parent, sibling)
        }),
        None => None,
    };
    collapsed.unwrap_or_else(|| tree.clone())
}

/// Apply one specific structural operator.
pub fn apply_operator(
    op: StructuralOp,
    tree: &Expr,
    config: &MutationConfig,
    rng: &mut RandomStream,
) -> Expr {
    match op {
        StructuralOp::Point => point_mutation(tree, rng),
        StructuralOp::Subtree => subtree_mutation(tree, config, rng),
        StructuralOp::Grow => grow_mutation(tree, rng),
        StructuralOp::Shrink => shrink_mutation(tree, rng),
    }
}

/// Composite mutation.
///
/// Draws: the rate gate (one draw; with probability `1 - rate` the tree is
/// returned unchanged), then the weighted operator choice, then the
/// operator's own draws. Grow is swapped for shrink once the tree would
/// exceed `config.max_nodes` or [`MAX_DEPTH`]; subtree results over the
/// limits are discarded. A tree the config admits therefore always comes
/// back admitted.
pub fn mutate(
    tree: &Expr,
    rate: f64,
    weights: &OperatorWeights,
    config: &MutationConfig,
    rng: &mut RandomStream,
) -> Expr {
    if !rng.chance(rate) {
        return tree.clone();
    }
    let op = choose_operator(tree, weights, config, rng);
    apply_operator(op, tree, config, rng)
}

/// Weighted operator choice including the size guard.
pub(crate) fn choose_operator(
    tree: &Expr,
    weights: &OperatorWeights,
    config: &MutationConfig,
    rng: &mut RandomStream,
) -> StructuralOp {
    let mut op = weights.choose(rng);
    if op == StructuralOp::Grow
        && (tree.node_count() + 2 > config.max_nodes || tree.depth() >= MAX_DEPTH)
    {
        debug!(
            from = ?op,
            to = ?StructuralOp::Shrink,
            nodes = tree.node_count(),
            max_nodes = config.max_nodes,
            "operator swapped at size limit"
        );
        op = StructuralOp::Shrink;
    }
    debug!(?op, nodes = tree.node_count(), "structural mutation");
    op
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trees(seed: u32, n: usize, depth: usize) -> Vec<Expr> {
        let mut rng = RandomStream::new(seed);
        (0..n).map(|_| Expr::random(&mut rng, depth)).collect()
    }

    #[test]
    fn test_point_preserves_shape() {
        let mut rng = RandomStream::new(3);
        for tree in trees(1, 200, 4) {
            let mutated = point_mutation(&tree, &mut rng);
            assert_eq!(mutated.node_count(), tree.node_count());
            assert_eq!(mutated.depth(), tree.depth());
            assert!(mutated.is_well_formed());
        }
    }

    #[test]
    fn test_point_keeps_leaf_kind() {
        let mut rng = RandomStream::new(8);
        for _ in 0..50 {
            let c = point_mutation(&Expr::Const(4.0), &mut rng);
            assert!(matches!(c, Expr::Const(_)));
            let v = point_mutation(&Expr::Var(Variable::Z), &mut rng);
            assert!(matches!(v, Expr::Var(_)));
        }
    }

    #[test]
    fn test_grow_adds_two_nodes() {
        let mut rng = RandomStream::new(4);
        for tree in trees(2, 200, 4) {
            let grown = grow_mutation(&tree, &mut rng);
            assert_eq!(grown.node_count(), tree.node_count() + 2);
        }
    }

    #[test]
    fn test_shrink_strictly_removes() {
        let mut rng = RandomStream::new(5);
        for tree in trees(3, 300, 4) {
            let shrunk = shrink_mutation(&tree, &mut rng);
            if tree.node_count() < 2 {
                assert_eq!(shrunk, tree);
            } else {
                assert!(shrunk.node_count() < tree.node_count());
                assert!(shrunk.node_count() >= 1);
            }
        }
    }

    #[test]
    fn test_shrink_single_leaf_is_noop_without_draws() {
        let mut rng = RandomStream::new(6);
        let before = rng.state();
        let leaf = Expr::Var(Variable::X);
        assert_eq!(shrink_mutation(&leaf, &mut rng), leaf);
        assert_eq!(rng.state(), before);
    }

    #[test]
    fn test_shrink_three_node_tree_yields_leaf() {
        let mut rng = RandomStream::new(7);
        let tree = Expr::op(BinOp::Add, Expr::Var(Variable::X), Expr::Const(2.0));
        let shrunk = shrink_mutation(&tree, &mut rng);
        assert!(shrunk.is_leaf());
    }

    #[test]
    fn test_subtree_respects_cap() {
        let mut rng = RandomStream::new(9);
        let config = MutationConfig::default();
        for tree in trees(4, 200, 3) {
            let replaced = subtree_mutation(&tree, &config, &mut rng);
            assert!(replaced.depth() <= tree.depth() + config.max_subtree_depth);
        }
    }

    #[test]
    fn test_subtree_discards_oversized_results() {
        let mut rng = RandomStream::new(13);
        for tree in trees(7, 200, 4) {
            let config = MutationConfig {
                max_subtree_depth: 4,
                max_nodes: tree.node_count(),
            };
            let replaced = subtree_mutation(&tree, &config, &mut rng);
            assert!(config.admits(&replaced));
        }
    }

    #[test]
    fn test_grow_only_weights_shrink_at_the_limit() {
        let mut rng = RandomStream::new(14);
        let only_grow = OperatorWeights {
            point: 0.0,
            subtree: 0.0,
            grow: 1.0,
            shrink: 0.0,
        };
        let tree = Expr::op(BinOp::Add, Expr::Var(Variable::X), Expr::Const(2.0));
        let config = MutationConfig {
            max_subtree_depth: 2,
            max_nodes: 3,
        };
        let out = mutate(&tree, 1.0, &only_grow, &config, &mut rng);
        assert!(out.is_leaf());
    }

    #[test]
    fn test_repeated_mutation_stays_admitted() {
        let mut rng = RandomStream::new(15);
        let weights = OperatorWeights::default();
        let config = MutationConfig {
            max_subtree_depth: 3,
            max_nodes: 21,
        };
        for mut tree in trees(8, 20, 3) {
            for _ in 0..200 {
                tree = mutate(&tree, 1.0, &weights, &config, &mut rng);
                assert!(config.admits(&tree), "{} nodes", tree.node_count());
            }
        }
    }

    #[test]
    fn test_zero_rate_returns_clone() {
        let mut rng = RandomStream::new(10);
        let weights = OperatorWeights::default();
        let config = MutationConfig::default();
        for tree in trees(5, 50, 4) {
            assert_eq!(mutate(&tree, 0.0, &weights, &config, &mut rng), tree);
        }
    }

    #[test]
    fn test_input_not_modified() {
        let mut rng = RandomStream::new(11);
        let weights = OperatorWeights::default();
        let config = MutationConfig::default();
        for tree in trees(6, 100, 4) {
            let snapshot = tree.clone();
            let _ = mutate(&tree, 1.0, &weights, &config, &mut rng);
            assert_eq!(tree, snapshot);
        }
    }

    #[test]
    fn test_weights_single_operator() {
        let mut rng = RandomStream::new(12);
        let only_grow = OperatorWeights {
            point: 0.0,
            subtree: 0.0,
            grow: 1.0,
            shrink: 0.0,
        };
        for _ in 0..100 {
            assert_eq!(only_grow.choose(&mut rng), StructuralOp::Grow);
        }
    }

    #[test]
    fn test_zero_weights_fall_back_to_default() {
        let zero = OperatorWeights {
            point: 0.0,
            subtree: 0.0,
            grow: 0.0,
            shrink: 0.0,
        };
        let mut a = RandomStream::new(13);
        let mut b = RandomStream::new(13);
        for _ in 0..100 {
            assert_eq!(zero.choose(&mut a), OperatorWeights::default().choose(&mut b));
        }
    }

    #[test]
    fn test_size_guard_turns_grow_into_shrink() {
        let mut rng = RandomStream::new(14);
        let only_grow = OperatorWeights {
            point: 0.0,
            subtree: 0.0,
            grow: 1.0,
            shrink: 0.0,
        };
        let config = MutationConfig {
            max_nodes: 5,
            ..MutationConfig::default()
        };
        let mut tree = Expr::Var(Variable::X);
        for _ in 0..50 {
            tree = mutate(&tree, 1.0, &only_grow, &config, &mut rng);
            assert!(tree.node_count() <= config.max_nodes);
        }
    }

    #[test]
    fn test_named_entries() {
        let mut weights = OperatorWeights::default();
        for name in OperatorWeights::NAMES {
            assert!(weights.get(name).is_some());
        }
        if let Some(w) = weights.get_mut("grow") {
            *w = 1.0;
        }
        assert!((weights.grow - 1.0).abs() < f64::EPSILON);
        assert!(weights.get("crossover").is_none());
    }
}
