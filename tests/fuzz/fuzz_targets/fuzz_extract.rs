#![no_main]
use std::path::Path;

use covagg::model::FunctionKey;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Extraction must not panic on any payload; split the input between
    // the coverage file and the initial log.
    let key = FunctionKey {
        variant: "v".to_string(),
        project: "p".to_string(),
        file_folder: "f_cpp".to_string(),
        function: "fn".to_string(),
    };
    let mid = data.len() / 2;
    let _ = covagg::extract::extract(&key, &data[..mid], &data[mid..], Path::new("fuzz"));
});
