use std::time::{Duration, Instant};

use feeder_core::{
    AutoFeedUpdate, FeedCfg, FeedController, FeedEvent, FeedState, ManualFeedRequest, WatchdogCfg,
    WeightReading,
};
use feeder_traits::Actuator;
use proptest::prelude::*;

#[derive(Default)]
struct LevelSpy {
    level: u8,
}

impl Actuator for LevelSpy {
    fn set_drive(&mut self, level: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.level = level;
        Ok(())
    }
}

/// One tick of generated input.
#[derive(Debug, Clone)]
struct Step {
    dt_ms: u64,
    reading: Option<f32>,
    manual: Option<f32>,
    reconfigure: Option<(bool, u64, f32)>,
    cancel: bool,
}

prop_compose! {
    fn step_strategy()(
        dt_ms in 50u64..=200,
        reading in proptest::option::weighted(0.85, -20.0f32..300.0),
        manual in proptest::option::weighted(0.1, -50.0f32..150.0),
        reconfigure in proptest::option::weighted(0.03, (any::<bool>(), 0u64..3, -20.0f32..200.0)),
        cancel in proptest::bool::weighted(0.02),
    ) -> Step {
        Step { dt_ms, reading, manual, reconfigure, cancel }
    }
}

proptest! {
    #[test]
    fn activation_is_bounded_and_targets_non_negative(
        steps in proptest::collection::vec(step_strategy(), 1..400),
        watchdog_ms in 2_000u64..20_000,
    ) {
        let t0 = Instant::now();
        let mut c = FeedController::new(
            LevelSpy::default(),
            FeedCfg::default(),
            WatchdogCfg { timeout_ms: watchdog_ms },
            t0,
        );
        let watchdog = Duration::from_millis(watchdog_ms);
        let max_tick = Duration::from_millis(200);
        let mut now = t0;

        for step in steps {
            now += Duration::from_millis(step.dt_ms);
            if let Some(grams) = step.manual {
                c.request_manual_feed(ManualFeedRequest::new(grams));
            }
            if let Some((enabled, minutes, grams)) = step.reconfigure {
                c.configure_auto_feed(&AutoFeedUpdate { enabled, interval_minutes: minutes, grams }, now);
            }
            if step.cancel {
                c.request_cancel();
            }
            let reading = match step.reading {
                Some(g) => WeightReading::valid(g, 0),
                None => WeightReading::invalid(),
            };

            for ev in c.tick(now, &reading) {
                match ev {
                    FeedEvent::Started { target_g, .. } => prop_assert!(target_g >= 0.0),
                    FeedEvent::Finished { elapsed, .. } => {
                        prop_assert!(elapsed <= watchdog + max_tick, "ran {elapsed:?} > {watchdog:?}");
                    }
                    _ => {}
                }
            }

            let feeding = c.state() == FeedState::Feeding;
            prop_assert_eq!(feeding, c.session().is_some());
            prop_assert_eq!(feeding, c.actuator().level > 0);
            if let Some(s) = c.session() {
                prop_assert!(s.target_g() >= 0.0);
                prop_assert!(s.elapsed(now) < watchdog);
            }
            if let Some(w) = c.last_weight() {
                prop_assert!(w >= 0.0);
            }
        }
    }
}
