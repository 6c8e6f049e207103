#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<feeder_config::Config>(data) {
        if cfg.validate().is_ok() {
            // Anything that validates must also be accepted by the loop's runtime types.
            let _feed: feeder_core::FeedCfg = (&cfg.feed).into();
            let _loop: feeder_core::LoopCfg = (&cfg.loop_cfg).into();
            let _ = cfg.topic_prefix();
        }
    }
});
