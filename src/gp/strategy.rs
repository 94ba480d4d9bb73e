//! Pluggable tree mutation strategies.
//!
//! Genome-level mutation goes through a [`TreeMutator`], injected explicitly
//! into the genome factory. The default is [`StructuralMutator`], the
//! composite operator from [`crate::gp::mutation`].
//!
//! [`GuardedMutator`] lets an external rewriter (for example a
//! network-backed language model) propose replacement trees in text form.
//! The rewriter owns its transport, timeout and retries; this crate never
//! awaits it. Whatever the rewriter returns is parsed and bounds-checked, and
//! on any failure the structural operators take over, so mutation always
//! succeeds.

use crate::gp::expr::Expr;
use crate::gp::mutation::{apply_operator, choose_operator, MutationConfig, OperatorWeights};
use crate::gp::text::ParseError;
use crate::rng::RandomStream;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default time budget handed to an external rewriter.
pub const DEFAULT_REWRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// "Tree in, tree out" mutation contract.
pub trait TreeMutator: fmt::Debug + Send + Sync {
    /// Produce a mutated copy of `tree`.
    ///
    /// With probability `1 - rate` the tree is returned unchanged.
    /// Implementations must always return a well-formed tree.
    fn mutate(
        &self,
        tree: &Expr,
        rate: f64,
        weights: &OperatorWeights,
        rng: &mut RandomStream,
    ) -> Expr;
}

/// The built-in structural operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructuralMutator {
    /// Operator configuration.
    pub config: MutationConfig,
}

impl StructuralMutator {
    /// Create a structural mutator.
    #[must_use]
    pub const fn new(config: MutationConfig) -> Self {
        Self { config }
    }
}

impl TreeMutator for StructuralMutator {
    fn mutate(
        &self,
        tree: &Expr,
        rate: f64,
        weights: &OperatorWeights,
        rng: &mut RandomStream,
    ) -> Expr {
        crate::gp::mutation::mutate(tree, rate, weights, &self.config, rng)
    }
}

/// Failure reported by an external rewriter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    /// The rewriter gave up after its time budget.
    #[error("rewrite timed out after {0:?}")]
    Timeout(Duration),
    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered but declined to produce a tree.
    #[error("rewrite declined: {0}")]
    Declined(String),
}

/// Optional external source of replacement trees.
pub trait ExternalRewriter: Send + Sync {
    /// Given the text form of a tree, return the text form of a replacement.
    ///
    /// # Errors
    ///
    /// Any failure; the caller falls back to the structural operators.
    fn rewrite(&self, rendered: &str, timeout: Duration) -> Result<String, RewriteError>;
}

impl<F> ExternalRewriter for F
where
    F: Fn(&str, Duration) -> Result<String, RewriteError> + Send + Sync,
{
    fn rewrite(&self, rendered: &str, timeout: Duration) -> Result<String, RewriteError> {
        self(rendered, timeout)
    }
}

/// Why an external proposal was discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProposalError {
    /// The rewriter failed.
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    /// The returned text is not a valid tree.
    #[error("malformed proposal: {0}")]
    Parse(#[from] ParseError),
    /// The proposal breaks the size limits.
    #[error("proposal too large: {nodes} nodes, depth {depth}")]
    TooLarge {
        /// Node count of the proposal.
        nodes: usize,
        /// Depth of the proposal.
        depth: usize,
    },
    /// The proposal contains non-finite constants.
    #[error("proposal is not well formed")]
    IllFormed,
}

/// External rewriter with the structural operators as unconditional fallback.
pub struct GuardedMutator<R> {
    rewriter: R,
    fallback: StructuralMutator,
    timeout: Duration,
    max_depth: usize,
}

impl<R> fmt::Debug for GuardedMutator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedMutator")
            .field("fallback", &self.fallback)
            .field("timeout", &self.timeout)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl<R: ExternalRewriter> GuardedMutator<R> {
    /// Wrap a rewriter. Proposals may not exceed `config.max_nodes` nodes.
    #[must_use]
    pub const fn new(rewriter: R, config: MutationConfig) -> Self {
        Self {
            rewriter,
            fallback: StructuralMutator::new(config),
            timeout: DEFAULT_REWRITE_TIMEOUT,
            max_depth: 16,
        }
    }

    /// Override the time budget handed to the rewriter.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the maximum accepted proposal depth.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Ask the rewriter for a replacement and validate it.
    ///
    /// # Errors
    ///
    /// Returns why the proposal cannot be used.
    pub fn propose(&self, tree: &Expr) -> Result<Expr, ProposalError> {
        let text = self.rewriter.rewrite(&tree.to_string(), self.timeout)?;
        let proposal: Expr = text.trim().parse()?;
        if !proposal.is_well_formed() {
            return Err(ProposalError::IllFormed);
        }
        let (nodes, depth) = (proposal.node_count(), proposal.depth());
        if nodes > self.fallback.config.max_nodes || depth > self.max_depth {
            return Err(ProposalError::TooLarge { nodes, depth });
        }
        Ok(proposal)
    }
}

impl<R: ExternalRewriter> TreeMutator for GuardedMutator<R> {
    fn mutate(
        &self,
        tree: &Expr,
        rate: f64,
        weights: &OperatorWeights,
        rng: &mut RandomStream,
    ) -> Expr {
        if !rng.chance(rate) {
            return tree.clone();
        }
        match self.propose(tree) {
            Ok(proposal) => {
                debug!(%proposal, "accepted external rewrite");
                proposal
            }
            Err(reason) => {
                warn!(%reason, "external rewrite rejected, using structural operators");
                let op = choose_operator(tree, weights, &self.fallback.config, rng);
                apply_operator(op, tree, &self.fallback.config, rng)
            }
        }
    }
}
