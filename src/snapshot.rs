//! Versioned snapshot codec.
//!
//! A snapshot captures everything needed to resume a run: the run scope
//! (seed, tick, id counter, stream state), the simulation store, and an
//! opaque scenario payload.
//!
//! # Wire format (version 2)
//!
//! ```text
//! {
//!   "meta":  { "version": 2, "timestamp": <ms>, "scenarioId": "continuous" },
//!   "store": { "scope": {..}, "control": {..}, "state": {..},
//!              "evolution": {..}, "speed": 1.0, "paused": false },
//!   "scenarioData": "<opaque text>"
//! }
//! ```
//!
//! Loading never trusts the input. Version 1 documents are migrated to the
//! current layout first; every field is then sanitized on its own, clamping
//! numbers into range and replacing mistyped values by defaults. A document
//! that cannot be read at all is rejected and the caller keeps its state.

mod migrate;
mod sanitize;

use crate::scope::RunScopeState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

pub use sanitize::{
    CONTROL_K_RANGE, CONTROL_SIGMA_RANGE, CONTROL_U_RANGE, MUTATION_RATE_RANGE,
    POPULATION_SIZE_RANGE, SPEED_RANGE, STATE_D_RANGE, STATE_XV_RANGE,
};

/// Version written by [`create_snapshot`].
pub const SCHEMA_VERSION: u64 = 2;

/// Flat-store layout still accepted on load.
pub const LEGACY_VERSION: u64 = 1;

/// Errors raised by the snapshot codec.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Not JSON, not an object, or missing `meta` / `store`.
    #[error("malformed snapshot: {0}")]
    Malformed(String),
    /// A schema version this build does not read.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(String),
    /// Encoding a snapshot failed.
    #[error("cannot encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Which simulation a snapshot belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioId {
    /// Continuous control loop.
    #[default]
    Continuous,
    /// Conjecture search.
    Conjecture,
    /// Population ecology.
    Ecology,
}

impl ScenarioId {
    /// All scenarios.
    pub const ALL: [Self; 3] = [Self::Continuous, Self::Conjecture, Self::Ecology];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Conjecture => "conjecture",
            Self::Ecology => "ecology",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controller inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlParams {
    /// Control effort, `[0, 1]`.
    #[serde(rename = "U")]
    pub u: f64,
    /// Gain, `[0, 10]`.
    #[serde(rename = "K")]
    pub k: f64,
    /// Noise level, `[0, 1]`.
    pub sigma: f64,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            u: 0.5,
            k: 1.0,
            sigma: 0.1,
        }
    }
}

/// Observed system state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    /// Disorder, `[0, 1]`.
    #[serde(rename = "D")]
    pub d: f64,
    /// Position, `[-1000, 1000]`.
    #[serde(rename = "X")]
    pub x: f64,
    /// Velocity, `[-1000, 1000]`.
    #[serde(rename = "V")]
    pub v: f64,
}

/// Evolution knobs exposed to the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionParams {
    /// Per-generation mutation rate, `[0, 1]`.
    pub mutation_rate: f64,
    /// Individuals per generation, `[2, 1000]`.
    pub population_size: u32,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            mutation_rate: 0.3,
            population_size: 32,
        }
    }
}

/// Simulation store persisted in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Store {
    /// Run scope checkpoint.
    pub scope: RunScopeState,
    /// Controller inputs.
    pub control: ControlParams,
    /// Observed state.
    pub state: SystemState,
    /// Evolution knobs.
    pub evolution: EvolutionParams,
    /// Playback speed, `[0.25, 16]`.
    pub speed: f64,
    /// Whether playback is paused.
    pub paused: bool,
}

impl Default for Store {
    fn default() -> Self {
        Self::with_scope(RunScopeState::fresh(0))
    }
}

impl Store {
    /// Default store around a scope checkpoint.
    #[must_use]
    pub fn with_scope(scope: RunScopeState) -> Self {
        Self {
            scope,
            control: ControlParams::default(),
            state: SystemState::default(),
            evolution: EvolutionParams::default(),
            speed: 1.0,
            paused: false,
        }
    }
}

/// Snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    /// Schema version.
    pub version: u64,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Owning scenario.
    pub scenario_id: ScenarioId,
}

/// A complete, versioned checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Header.
    pub meta: SnapshotMeta,
    /// Simulation store.
    pub store: Store,
    /// Opaque scenario payload.
    pub scenario_data: String,
}

impl Snapshot {
    /// Build a current-version snapshot with an explicit timestamp.
    #[must_use]
    pub fn with_timestamp(
        scenario_id: ScenarioId,
        store: &Store,
        payload: &str,
        timestamp: u64,
    ) -> Self {
        Self {
            meta: SnapshotMeta {
                version: SCHEMA_VERSION,
                timestamp,
                scenario_id,
            },
            store: *store,
            scenario_data: payload.to_string(),
        }
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encode as indented JSON.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build a current-version snapshot stamped with the wall clock.
///
/// Inputs are copied; the caller's store is untouched.
#[must_use]
pub fn create_snapshot(scenario_id: ScenarioId, store: &Store, payload: &str) -> Snapshot {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
    Snapshot::with_timestamp(scenario_id, store, payload, timestamp)
}

/// Decode, migrate and sanitize a snapshot.
///
/// # Errors
///
/// [`SnapshotError::Malformed`] if the text is not a JSON object with
/// `meta` and `store` objects; [`SnapshotError::UnsupportedVersion`] for a
/// version other than 1 or 2.
pub fn parse_snapshot(text: &str) -> Result<Snapshot, SnapshotError> {
    decode(text).inspect_err(|error| warn!(%error, "snapshot rejected"))
}

fn decode(text: &str) -> Result<Snapshot, SnapshotError> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
    let root = root
        .as_object()
        .ok_or_else(|| SnapshotError::Malformed("top level is not an object".into()))?;
    let meta = object_field(root, "meta")?;
    object_field(root, "store")?;

    let version = meta
        .get("version")
        .or_else(|| meta.get("schemaVersion"))
        .ok_or_else(|| SnapshotError::Malformed("meta has no version".into()))?;
    match version.as_u64() {
        Some(SCHEMA_VERSION) => Ok(sanitize::snapshot(root)),
        Some(LEGACY_VERSION) => {
            debug!("migrating version 1 snapshot");
            let migrated = migrate::from_v1(root);
            Ok(sanitize::snapshot(&migrated))
        }
        _ => Err(SnapshotError::UnsupportedVersion(version.to_string())),
    }
}

fn object_field<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Map<String, Value>, SnapshotError> {
    root.get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| SnapshotError::Malformed(format!("missing {key} object")))
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_store() -> Store {
        Store {
            scope: RunScopeState {
                seed: 42,
                tick: 17,
                id_counter: 5,
                rng_state: 123_456,
            },
            control: ControlParams {
                u: 0.25,
                k: 7.5,
                sigma: 0.3,
            },
            state: SystemState {
                d: 0.9,
                x: -12.5,
                v: 0.1,
            },
            evolution: EvolutionParams {
                mutation_rate: 0.4,
                population_size: 64,
            },
            speed: 2.0,
            paused: true,
        }
    }

    #[test]
    fn test_roundtrip() {
        let store = sample_store();
        let snapshot = create_snapshot(ScenarioId::Ecology, &store, "{\"a\":1}");
        let parsed = parse_snapshot(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
        assert_eq!(parsed.meta.version, SCHEMA_VERSION);
        assert_eq!(store, sample_store());
    }

    #[test]
    fn test_wire_keys() {
        let snapshot = Snapshot::with_timestamp(ScenarioId::Conjecture, &sample_store(), "p", 9);
        let value: Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["meta"]["scenarioId"], "conjecture");
        assert_eq!(value["meta"]["timestamp"], 9);
        assert_eq!(value["store"]["control"]["U"], 0.25);
        assert_eq!(value["store"]["state"]["X"], -12.5);
        assert_eq!(value["store"]["evolution"]["populationSize"], 64);
        assert_eq!(value["store"]["scope"]["idCounter"], 5);
        assert_eq!(value["scenarioData"], "p");
    }

    #[test]
    fn test_rejections() {
        for text in ["", "[1,2]", "42", "{\"store\":{}}", "{\"meta\":{\"version\":2}}"] {
            assert!(matches!(
                parse_snapshot(text),
                Err(SnapshotError::Malformed(_))
            ));
        }
        let future = json!({ "meta": { "version": 3 }, "store": {} }).to_string();
        assert!(matches!(
            parse_snapshot(&future),
            Err(SnapshotError::UnsupportedVersion(v)) if v == "3"
        ));
        let textual = json!({ "meta": { "version": "2" }, "store": {} }).to_string();
        assert!(matches!(
            parse_snapshot(&textual),
            Err(SnapshotError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_schema_version_alias() {
        let text = json!({ "meta": { "schemaVersion": 2 }, "store": {} }).to_string();
        let snapshot = parse_snapshot(&text).unwrap();
        assert_eq!(snapshot.store, Store::default());
        assert_eq!(snapshot.meta.scenario_id, ScenarioId::Continuous);
    }

    #[test]
    fn test_scenario_names() {
        for id in ScenarioId::ALL {
            assert_eq!(ScenarioId::from_wire(id.as_str()), Some(id));
            assert_eq!(id.to_string(), id.as_str());
        }
        assert_eq!(ScenarioId::from_wire("chess"), None);
    }
}
