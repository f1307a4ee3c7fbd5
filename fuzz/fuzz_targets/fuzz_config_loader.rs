#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<feeder_config::Config>(data) {
        let _ = cfg.validate();
        let _ = cfg.effective_expected_rotation_ms();
    }
});
