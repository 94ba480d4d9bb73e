//! Version 1 to version 2 migration.
//!
//! Version 1 kept every store field flat and named the scenario and payload
//! differently:
//!
//! ```text
//! v1 meta.scenario                 -> v2 meta.scenarioId
//! v1 store.{seed,tick,idCounter,rngState} -> v2 store.scope.*
//! v1 store.{U,K,sigma}             -> v2 store.control.*
//! v1 store.{D,X,V}                 -> v2 store.state.*
//! v1 store.{mutationRate,populationSize} -> v2 store.evolution.*
//! v1 payload                       -> v2 scenarioData
//! ```
//!
//! Values are moved as-is; sanitization runs afterwards.

use super::SCHEMA_VERSION;
use serde_json::{Map, Value};

type Object = Map<String, Value>;

const SCOPE_KEYS: [&str; 4] = ["seed", "tick", "idCounter", "rngState"];
const CONTROL_KEYS: [&str; 3] = ["U", "K", "sigma"];
const STATE_KEYS: [&str; 3] = ["D", "X", "V"];
const EVOLUTION_KEYS: [&str; 2] = ["mutationRate", "populationSize"];

/// Rewrite a version 1 document into the version 2 layout.
pub(super) fn from_v1(root: &Object) -> Object {
    let empty = Object::new();
    let meta = root.get("meta").and_then(Value::as_object).unwrap_or(&empty);
    let store = root.get("store").and_then(Value::as_object).unwrap_or(&empty);

    let mut new_meta = Object::new();
    new_meta.insert("version".into(), Value::from(SCHEMA_VERSION));
    copy(meta, "timestamp", &mut new_meta, "timestamp");
    copy(meta, "scenario", &mut new_meta, "scenarioId");

    let mut new_store = Object::new();
    new_store.insert("scope".into(), group(store, &SCOPE_KEYS));
    new_store.insert("control".into(), group(store, &CONTROL_KEYS));
    new_store.insert("state".into(), group(store, &STATE_KEYS));
    new_store.insert("evolution".into(), group(store, &EVOLUTION_KEYS));
    copy(store, "speed", &mut new_store, "speed");
    copy(store, "paused", &mut new_store, "paused");

    let mut out = Object::new();
    out.insert("meta".into(), Value::Object(new_meta));
    out.insert("store".into(), Value::Object(new_store));
    copy(root, "payload", &mut out, "scenarioData");
    out
}

fn group(store: &Object, keys: &[&str]) -> Value {
    Value::Object(
        keys.iter()
            .filter_map(|&k| store.get(k).map(|v| (k.to_string(), v.clone())))
            .collect(),
    )
}

fn copy(from: &Object, key: &str, to: &mut Object, new_key: &str) {
    if let Some(v) = from.get(key) {
        to.insert(new_key.to_string(), v.clone());
    }
}
