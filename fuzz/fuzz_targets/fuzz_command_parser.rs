#![no_main]
use feeder_core::{MalformedPolicy, ManualCommand, parse_auto_feed, parse_manual_feed};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    for policy in [MalformedPolicy::FeedDefault, MalformedPolicy::Ignore] {
        if let ManualCommand::Feed { request, .. } = parse_manual_feed(data, policy, 10.0) {
            assert!(request.grams.is_finite() && request.grams >= 0.0);
        }
    }
    if let Ok(update) = parse_auto_feed(data) {
        assert!(update.grams.is_finite() && update.grams >= 0.0);
    }
});
