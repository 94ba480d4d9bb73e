//! Subtree crossover.
//!
//! Crossover is asymmetric: the first parent contributes the trunk, the
//! second the graft. The child is always the first parent with exactly one
//! subtree replaced by a copy of exactly one subtree of the second.

use crate::gp::expr::Expr;
use crate::rng::RandomStream;

/// Cross two trees.
///
/// Draws: a node index in `a`, then a node index in `b`. Neither parent is
/// modified.
#[must_use]
pub fn crossover(a: &Expr, b: &Expr, rng: &mut RandomStream) -> Expr {
    let trunk_index = rng.index(a.node_count());
    let graft_index = rng.index(b.node_count());
    crossover_at(a, trunk_index, b, graft_index).unwrap_or_else(|| a.clone())
}

/// Replace the subtree of `a` at `trunk_index` with the subtree of `b` at
/// `graft_index`. `None` if either index is out of range.
#[must_use]
pub fn crossover_at(a: &Expr, trunk_index: usize, b: &Expr, graft_index: usize) -> Option<Expr> {
    let graft = b.subtree(graft_index)?;
    a.replace_subtree(trunk_index, graft)
}
