//! Expression tree representation.
//!
//! An [`Expr`] is an owned binary tree: leaves are numeric constants or
//! variables, internal nodes apply one of six arithmetic operators to exactly
//! two children. Trees have value semantics. Every operator in this crate
//! takes `&Expr` and builds a new tree; nothing is shared or mutated in place.
//!
//! Nodes are addressed by preorder index, with the root at index 0.

// Index arithmetic and constant draws use intentional casts
#![allow(clippy::cast_precision_loss)]

use crate::rng::RandomStream;
use serde::{Deserialize, Serialize};

/// Probability of emitting a leaf before the depth cap is reached.
pub const LEAF_PROBABILITY: f64 = 0.3;

/// Smallest constant produced by random generation.
pub const MIN_CONSTANT: i64 = 1;

/// Largest constant produced by random generation.
pub const MAX_CONSTANT: i64 = 9;

/// Deepest tree the text form reads back.
///
/// Structural operators never build a tree deeper than this, so every tree
/// they return survives a save and load.
pub const MAX_DEPTH: usize = 512;

/// Divisors smaller than this are treated as zero by protected operators.
const PROTECTED_EPSILON: f64 = 1e-9;

/// Variable symbols available to expression leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variable {
    /// `x`
    X,
    /// `y`
    Y,
    /// `z`
    Z,
    /// `n`
    N,
}

impl Variable {
    /// All variables in canonical order.
    pub const ALL: [Self; 4] = [Self::X, Self::Y, Self::Z, Self::N];

    /// Lowercase symbol used in the text form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
            Self::N => "n",
        }
    }

    /// Look a variable up by its symbol.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    /// Draw a variable uniformly.
    pub fn random(rng: &mut RandomStream) -> Self {
        Self::ALL[rng.index(Self::ALL.len())]
    }
}

/// Binary operators of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Protected division: a divisor near zero yields 0.
    Div,
    /// Protected power: a non-finite result yields 0.
    Pow,
    /// Protected remainder: a divisor near zero yields 0.
    Mod,
}

impl BinOp {
    /// All operators in canonical order (also the feature order).
    pub const ALL: [Self; 6] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Pow,
        Self::Mod,
    ];

    /// Position of this operator in [`BinOp::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Add => 0,
            Self::Sub => 1,
            Self::Mul => 2,
            Self::Div => 3,
            Self::Pow => 4,
            Self::Mod => 5,
        }
    }

    /// Infix symbol.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
            Self::Pow => '^',
            Self::Mod => '%',
        }
    }

    /// Draw an operator uniformly.
    pub fn random(rng: &mut RandomStream) -> Self {
        Self::ALL[rng.index(Self::ALL.len())]
    }

    /// Apply the operator with protected semantics.
    #[must_use]
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => {
                if b.abs() < PROTECTED_EPSILON {
                    0.0
                } else {
                    a / b
                }
            }
            Self::Pow => {
                let r = a.powf(b);
                if r.is_finite() { r } else { 0.0 }
            }
            Self::Mod => {
                if b.abs() < PROTECTED_EPSILON {
                    0.0
                } else {
                    a % b
                }
            }
        }
    }
}

/// Variable values used when evaluating a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    /// Value of `x`.
    pub x: f64,
    /// Value of `y`.
    pub y: f64,
    /// Value of `z`.
    pub z: f64,
    /// Value of `n`.
    pub n: f64,
}

impl Bindings {
    /// Bindings with only `x` set.
    #[must_use]
    pub const fn with_x(x: f64) -> Self {
        Self {
            x,
            y: 0.0,
            z: 0.0,
            n: 0.0,
        }
    }

    /// Value bound to `var`.
    #[must_use]
    pub const fn get(&self, var: Variable) -> f64 {
        match var {
            Variable::X => self.x,
            Variable::Y => self.y,
            Variable::Z => self.z,
            Variable::N => self.n,
        }
    }
}

/// Symbolic expression tree.
///
/// Serialized through its infix text form (see [`crate::gp::text`]), which
/// keeps snapshots readable and independent of the enum layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Expr {
    /// Numeric constant.
    Const(f64),
    /// Variable reference.
    Var(Variable),
    /// Operator applied to a left and right child.
    Op(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Build an operator node.
    #[must_use]
    pub fn op(op: BinOp, left: Self, right: Self) -> Self {
        Self::Op(op, Box::new(left), Box::new(right))
    }

    /// Generate a random tree whose depth never exceeds `max_depth`.
    ///
    /// At the depth cap, or with probability [`LEAF_PROBABILITY`], a leaf is
    /// emitted; otherwise an operator node with two random children.
    pub fn random(rng: &mut RandomStream, max_depth: usize) -> Self {
        if max_depth == 0 || rng.chance(LEAF_PROBABILITY) {
            Self::random_leaf(rng)
        } else {
            let op = BinOp::random(rng);
            let left = Self::random(rng, max_depth - 1);
            let right = Self::random(rng, max_depth - 1);
            Self::op(op, left, right)
        }
    }

    /// Generate a random leaf: a variable or a small integer constant.
    pub fn random_leaf(rng: &mut RandomStream) -> Self {
        if rng.next_boolean() {
            Self::Var(Variable::random(rng))
        } else {
            Self::random_constant(rng)
        }
    }

    /// Generate a random constant leaf.
    pub fn random_constant(rng: &mut RandomStream) -> Self {
        Self::Const(rng.next_int(MIN_CONSTANT, MAX_CONSTANT) as f64)
    }

    /// Whether this node has no children.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        !matches!(self, Self::Op(..))
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Self::Const(_) | Self::Var(_) => 1,
            Self::Op(_, a, b) => 1 + a.node_count() + b.node_count(),
        }
    }

    /// Depth in edges; a single leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Const(_) | Self::Var(_) => 0,
            Self::Op(_, a, b) => 1 + a.depth().max(b.depth()),
        }
    }

    /// Number of variable leaves.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        match self {
            Self::Const(_) => 0,
            Self::Var(_) => 1,
            Self::Op(_, a, b) => a.variable_count() + b.variable_count(),
        }
    }

    /// Structural invariants: finite constants everywhere.
    ///
    /// Two children per operator and acyclicity are guaranteed by the type.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Const(c) => c.is_finite(),
            Self::Var(_) => true,
            Self::Op(_, a, b) => a.is_well_formed() && b.is_well_formed(),
        }
    }

    /// Evaluate the tree with protected operator semantics.
    #[must_use]
    pub fn eval(&self, bindings: &Bindings) -> f64 {
        match self {
            Self::Const(c) => *c,
            Self::Var(v) => bindings.get(*v),
            Self::Op(op, a, b) => op.apply(a.eval(bindings), b.eval(bindings)),
        }
    }

    /// Subtree rooted at the given preorder index.
    #[must_use]
    pub fn subtree(&self, index: usize) -> Option<&Self> {
        if index == 0 {
            return Some(self);
        }
        match self {
            Self::Const(_) | Self::Var(_) => None,
            Self::Op(_, a, b) => {
                let a_count = a.node_count();
                if index - 1 < a_count {
                    a.subtree(index - 1)
                } else {
                    b.subtree(index - 1 - a_count)
                }
            }
        }
    }

    /// Copy of the tree with the subtree at `index` replaced by `donor`.
    ///
    /// Returns `None` if `index` is out of range.
    #[must_use]
    pub fn replace_subtree(&self, index: usize, donor: &Self) -> Option<Self> {
        self.rebuild_at(index, &mut |_| donor.clone())
    }

    /// Copy of the tree with the node at `index` rebuilt by `f`.
    ///
    /// `f` receives the original subtree and returns its replacement. Only
    /// the path from the root to `index` is rebuilt; everything else is
    /// cloned verbatim.
    pub(crate) fn rebuild_at<F>(&self, index: usize, f: &mut F) -> Option<Self>
    where
        F: FnMut(&Self) -> Self,
    {
        if index == 0 {
            return Some(f(self));
        }
        match self {
            Self::Const(_) | Self::Var(_) => None,
            Self::Op(op, a, b) => {
                let a_count = a.node_count();
                let index = index - 1;
                if index < a_count {
                    let new_a = a.rebuild_at(index, f)?;
                    Some(Self::Op(*op, Box::new(new_a), b.clone()))
                } else {
                    let new_b = b.rebuild_at(index - a_count, f)?;
                    Some(Self::Op(*op, a.clone(), Box::new(new_b)))
                }
            }
        }
    }

    /// Preorder index of the parent of `index`, if it has one.
    #[must_use]
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        fn walk(node: &Expr, base: usize, target: usize) -> Option<usize> {
            let Expr::Op(_, a, b) = node else {
                return None;
            };
            let left = base + 1;
            let right = left + a.node_count();
            if target == left || target == right {
                return Some(base);
            }
            if target < right {
                walk(a, left, target)
            } else {
                walk(b, right, target)
            }
        }
        if index == 0 || index >= self.node_count() {
            return None;
        }
        walk(self, 0, index)
    }

    /// Count of operator nodes per kind, in [`BinOp::ALL`] order.
    #[must_use]
    pub fn op_counts(&self) -> [usize; 6] {
        let mut counts = [0usize; 6];
        self.visit(&mut |node, _| {
            if let Self::Op(op, _, _) = node {
                counts[op.index()] += 1;
            }
        });
        counts
    }

    /// Preorder traversal calling `f(node, depth)`.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&Self, usize),
    {
        fn go<F: FnMut(&Expr, usize)>(node: &Expr, depth: usize, f: &mut F) {
            f(node, depth);
            if let Expr::Op(_, a, b) = node {
                go(a, depth + 1, f);
                go(b, depth + 1, f);
            }
        }
        go(self, 0, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Expr {
        // ((x + 3) * y)
        Expr::op(
            BinOp::Mul,
            Expr::op(BinOp::Add, Expr::Var(Variable::X), Expr::Const(3.0)),
            Expr::Var(Variable::Y),
        )
    }

    #[test]
    fn test_counts_and_depth() {
        let expr = sample();
        assert_eq!(expr.node_count(), 5);
        assert_eq!(expr.depth(), 2);
        assert_eq!(expr.variable_count(), 2);
        assert_eq!(expr.op_counts(), [1, 0, 1, 0, 0, 0]);
        assert_eq!(Expr::Const(1.0).depth(), 0);
    }

    #[test]
    fn test_subtree_preorder() {
        let expr = sample();
        assert_eq!(expr.subtree(0), Some(&expr));
        assert_eq!(expr.subtree(2), Some(&Expr::Var(Variable::X)));
        assert_eq!(expr.subtree(3), Some(&Expr::Const(3.0)));
        assert_eq!(expr.subtree(4), Some(&Expr::Var(Variable::Y)));
        assert_eq!(expr.subtree(5), None);
    }

    #[test]
    fn test_replace_subtree_leaves_input_untouched() {
        let expr = sample();
        let replaced = expr.replace_subtree(3, &Expr::Var(Variable::Z)).unwrap();
        assert_eq!(replaced.subtree(3), Some(&Expr::Var(Variable::Z)));
        assert_eq!(expr, sample());
        assert!(expr.replace_subtree(9, &Expr::Const(0.0)).is_none());
    }

    #[test]
    fn test_parent_of() {
        let expr = sample();
        assert_eq!(expr.parent_of(0), None);
        assert_eq!(expr.parent_of(1), Some(0));
        assert_eq!(expr.parent_of(2), Some(1));
        assert_eq!(expr.parent_of(3), Some(1));
        assert_eq!(expr.parent_of(4), Some(0));
        assert_eq!(expr.parent_of(5), None);
    }

    #[test]
    fn test_eval_protected() {
        let expr = sample();
        let b = Bindings {
            x: 2.0,
            y: 4.0,
            ..Bindings::default()
        };
        assert!((expr.eval(&b) - 20.0).abs() < 1e-12);

        let div = Expr::op(BinOp::Div, Expr::Const(1.0), Expr::Const(0.0));
        assert!(div.eval(&b).abs() < f64::EPSILON);
        let modulo = Expr::op(BinOp::Mod, Expr::Const(7.0), Expr::Const(0.0));
        assert!(modulo.eval(&b).abs() < f64::EPSILON);
        let pow = Expr::op(BinOp::Pow, Expr::Const(-8.0), Expr::Const(0.5));
        assert!(pow.eval(&b).abs() < f64::EPSILON);
    }

    #[test]
    fn test_random_respects_depth_cap() {
        let mut rng = RandomStream::new(42);
        for depth in 0..6 {
            for _ in 0..200 {
                let tree = Expr::random(&mut rng, depth);
                assert!(tree.depth() <= depth);
                assert!(tree.is_well_formed());
            }
        }
        assert!(Expr::random(&mut rng, 0).is_leaf());
    }

    #[test]
    fn test_random_constants_in_range() {
        let mut rng = RandomStream::new(1);
        for _ in 0..500 {
            if let Expr::Const(c) = Expr::random_constant(&mut rng) {
                assert!((1.0..=9.0).contains(&c));
                assert!((c - c.round()).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn test_variable_names() {
        for var in Variable::ALL {
            assert_eq!(Variable::from_name(var.name()), Some(var));
        }
        assert_eq!(Variable::from_name("q"), None);
    }
}
