#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Coercion and rounding must not panic on any JSON value.
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Some(v) = covagg::extract::to_coverage_value(Some(&value)) {
            let _ = covagg::model::round2(v);
        }
    }
});
