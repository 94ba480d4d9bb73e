#![no_main]

use evoscope::snapshot::{parse_snapshot, SCHEMA_VERSION};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Loading must never panic; whatever it accepts must be sane.
    let Ok(snapshot) = parse_snapshot(text) else {
        return;
    };
    assert_eq!(snapshot.meta.version, SCHEMA_VERSION);

    let store = &snapshot.store;
    assert!((0.0..=1.0).contains(&store.control.u));
    assert!((0.0..=1.0).contains(&store.state.d));
    assert!((0.25..=16.0).contains(&store.speed));
    assert!((2..=1000).contains(&store.evolution.population_size));

    // A sanitized snapshot is a fixed point of encode + load.
    let encoded = snapshot.to_json().expect("sanitized snapshot encodes");
    let reloaded = parse_snapshot(&encoded).expect("sanitized snapshot reloads");
    assert_eq!(reloaded, snapshot);
});
