#![no_main]
use libfuzzer_sys::fuzz_target;
use rexarm_core::{AngleLimits, DhChain, SessionConfig};

fuzz_target!(|data: &str| {
    // Parsing, validation and the runtime conversions must reject bad input without panicking.
    let Ok(cfg) = rexarm_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    if let Ok(limits) = AngleLimits::try_from(&cfg.arm) {
        let probe = vec![f64::MAX; limits.len()];
        let clamped = limits.clamp(&probe);
        assert_eq!(clamped.len(), limits.len());
    }
    let chain = DhChain::from(&cfg.kinematics);
    let _ = chain.forward(&vec![0.0; chain.len()]);
    let _ = SessionConfig::from(&cfg);
});
