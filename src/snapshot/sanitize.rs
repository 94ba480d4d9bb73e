//! Field-by-field sanitization of decoded snapshots.
//!
//! Each field is read on its own: a number out of range is clamped, a value
//! of the wrong type (or a missing one) becomes the field's default. One bad
//! field never invalidates its neighbours.

// Clamped wire numbers are narrowed to their field types
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use super::{
    ControlParams, EvolutionParams, ScenarioId, Snapshot, SnapshotMeta, Store, SystemState,
    SCHEMA_VERSION,
};
use crate::scope::RunScopeState;
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

type Object = Map<String, Value>;

/// Accepted range of `control.U`.
pub const CONTROL_U_RANGE: RangeInclusive<f64> = 0.0..=1.0;
/// Accepted range of `control.K`.
pub const CONTROL_K_RANGE: RangeInclusive<f64> = 0.0..=10.0;
/// Accepted range of `control.sigma`.
pub const CONTROL_SIGMA_RANGE: RangeInclusive<f64> = 0.0..=1.0;
/// Accepted range of `state.D`.
pub const STATE_D_RANGE: RangeInclusive<f64> = 0.0..=1.0;
/// Accepted range of `state.X` and `state.V`.
pub const STATE_XV_RANGE: RangeInclusive<f64> = -1000.0..=1000.0;
/// Accepted range of `evolution.mutationRate`.
pub const MUTATION_RATE_RANGE: RangeInclusive<f64> = 0.0..=1.0;
/// Accepted range of `evolution.populationSize`.
pub const POPULATION_SIZE_RANGE: RangeInclusive<f64> = 2.0..=1000.0;
/// Accepted range of `speed`.
pub const SPEED_RANGE: RangeInclusive<f64> = 0.25..=16.0;

/// Sanitize a current-layout document whose `meta` and `store` are known
/// to be objects.
pub(super) fn snapshot(root: &Object) -> Snapshot {
    let meta = section(Some(root), "meta");
    let scenario_id = meta
        .and_then(|m| m.get("scenarioId"))
        .and_then(Value::as_str)
        .and_then(ScenarioId::from_wire)
        .unwrap_or_default();
    Snapshot {
        meta: SnapshotMeta {
            version: SCHEMA_VERSION,
            timestamp: counter(meta, "timestamp", 0),
            scenario_id,
        },
        store: store(section(Some(root), "store")),
        scenario_data: payload(root.get("scenarioData")),
    }
}

fn store(obj: Option<&Object>) -> Store {
    let control = section(obj, "control");
    let state = section(obj, "state");
    let evolution = section(obj, "evolution");
    let (dc, ds, de) = (
        ControlParams::default(),
        SystemState::default(),
        EvolutionParams::default(),
    );
    Store {
        scope: scope(obj.and_then(|o| o.get("scope"))),
        control: ControlParams {
            u: number(control, "U", dc.u, &CONTROL_U_RANGE),
            k: number(control, "K", dc.k, &CONTROL_K_RANGE),
            sigma: number(control, "sigma", dc.sigma, &CONTROL_SIGMA_RANGE),
        },
        state: SystemState {
            d: number(state, "D", ds.d, &STATE_D_RANGE),
            x: number(state, "X", ds.x, &STATE_XV_RANGE),
            v: number(state, "V", ds.v, &STATE_XV_RANGE),
        },
        evolution: EvolutionParams {
            mutation_rate: number(
                evolution,
                "mutationRate",
                de.mutation_rate,
                &MUTATION_RATE_RANGE,
            ),
            population_size: number(
                evolution,
                "populationSize",
                f64::from(de.population_size),
                &POPULATION_SIZE_RANGE,
            )
            .round() as u32,
        },
        speed: number(obj, "speed", 1.0, &SPEED_RANGE),
        paused: obj
            .and_then(|o| o.get("paused"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

fn scope(value: Option<&Value>) -> RunScopeState {
    let Some(obj) = value.and_then(Value::as_object) else {
        return RunScopeState::fresh(0);
    };
    let seed = word(Some(obj), "seed", 0);
    RunScopeState {
        seed,
        tick: counter(Some(obj), "tick", 0),
        id_counter: counter(Some(obj), "idCounter", 0),
        rng_state: word(Some(obj), "rngState", seed),
    }
}

fn payload(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

fn section<'a>(obj: Option<&'a Object>, key: &str) -> Option<&'a Object> {
    obj.and_then(|o| o.get(key)).and_then(Value::as_object)
}

fn number(obj: Option<&Object>, key: &str, default: f64, range: &RangeInclusive<f64>) -> f64 {
    obj.and_then(|o| o.get(key))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .map_or(default, |v| v.clamp(*range.start(), *range.end()))
}

/// Non-negative integer; fractions truncate, negatives become zero.
fn counter(obj: Option<&Object>, key: &str, default: u64) -> u64 {
    let Some(value) = obj.and_then(|o| o.get(key)) else {
        return default;
    };
    if let Some(n) = value.as_u64() {
        return n;
    }
    match value.as_f64() {
        Some(f) if f.is_finite() => {
            if f <= 0.0 {
                0
            } else {
                f.min(u64::MAX as f64) as u64
            }
        }
        _ => default,
    }
}

fn word(obj: Option<&Object>, key: &str, default: u32) -> u32 {
    counter(obj, key, u64::from(default)).min(u64::from(u32::MAX)) as u32
}
