// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Evoscope: a deterministic genetic-programming substrate for replayable
//! population simulations.
//!
//! This crate provides:
//! - A seedable, bit-exact random stream and a run scope that checkpoints it
//! - Arithmetic expression trees with structural mutation and crossover
//! - A tiny guidance network trained by perturbation
//! - A genome factory whose lineages replay exactly from a seed
//! - A versioned, sanitizing snapshot codec
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │     Snapshot codec (v1 → v2)        │
//! ├─────────────────────────────────────┤
//! │   Genome factory │ Selection        │
//! ├──────────────────┬──────────────────┤
//! │  GP trees & ops  │ Guidance network │
//! ├──────────────────┴──────────────────┤
//! │   Run scope (tick, ids, stream)     │
//! │   Random stream (Mulberry32)        │
//! └─────────────────────────────────────┘
//! ```
//!
//! Everything above the random stream is pure given the stream state: the
//! same seed and the same call order always produce the same run.

pub mod config;
pub mod error;
pub mod genome;
pub mod gp;
pub mod guidance;
pub mod rng;
pub mod scope;
pub mod selection;
pub mod snapshot;

pub use config::{ConfigError, RunConfig};
pub use error::{Error, Result};
pub use genome::{Genome, GenomeConfig, GenomeFactory, MutationBias};
pub use gp::{Expr, TreeMutator};
pub use guidance::GuidanceNetwork;
pub use rng::RandomStream;
pub use scope::{RunScope, RunScopeState};
pub use snapshot::{create_snapshot, parse_snapshot, ScenarioId, Snapshot, SnapshotError, Store};
