#![no_main]

use libfuzzer_sys::fuzz_target;
use noteroll_core::EditorConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<EditorConfig>(data) {
        let _ = config.validate();
    }
});
