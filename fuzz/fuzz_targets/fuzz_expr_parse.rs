#![no_main]

use evoscope::gp::{Bindings, Expr};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(tree) = text.parse::<Expr>() else {
        return;
    };
    assert!(tree.is_well_formed());

    // Rendered text parses back to the same tree.
    let rendered = tree.to_string();
    let back: Expr = rendered.parse().expect("rendered tree parses");
    assert_eq!(back, tree);

    // Protected evaluation never panics.
    let _ = tree.eval(&Bindings::with_x(1.5));
});
