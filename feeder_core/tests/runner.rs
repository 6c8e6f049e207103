use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use feeder_core::{
    ChannelHandle, FeedEvent, FeedOutcome, FeedState, Feeder, LoadCellCfg, LoopCfg, MemoryChannel,
    Published, SensorCfg, Timeouts, WatchdogCfg, memory_channel,
};
use feeder_hardware::{
    SimulatedBowl, SimulatedClimate, SimulatedLid, SimulatedMotor, SimulatedRange, SimulatedScale,
};
use feeder_traits::clock::Clock;
use feeder_traits::clock::test_clock::TestClock;
use feeder_traits::{Actuator, BoxError, ClimateSensor, RangeSensor, WeightSource};
use serde_json::Value;

const PREFIX: &str = "/NomNom/test";

type SimFeeder = Feeder<SimulatedScale, SimulatedMotor, MemoryChannel>;

struct Rig {
    feeder: SimFeeder,
    bus: ChannelHandle,
    bowl: SimulatedBowl,
}

fn rig(loop_cfg: LoopCfg, watchdog_ms: u64) -> Rig {
    let bowl = SimulatedBowl::new(0.0, 2.0, 100.0);
    let (channel, bus) = memory_channel();
    let feeder = Feeder::builder()
        .with_weight_source(bowl.scale())
        .with_actuator(bowl.motor())
        .with_channel(channel)
        .with_clock(Arc::new(TestClock::new()))
        .with_loop(loop_cfg)
        .with_watchdog(WatchdogCfg {
            timeout_ms: watchdog_ms,
        })
        .with_load_cell(LoadCellCfg {
            counts_per_gram: 100.0,
            ..LoadCellCfg::default()
        })
        .with_topic_prefix(PREFIX)
        .build()
        .expect("build feeder");
    Rig { feeder, bus, bowl }
}

fn fast_loop() -> LoopCfg {
    LoopCfg {
        tick_ms: 100,
        ..LoopCfg::default()
    }
}

fn on<'a>(out: &'a [Published], suffix: &str) -> Vec<&'a Published> {
    let topic = format!("{PREFIX}{suffix}");
    out.iter().filter(|p| p.topic == topic).collect()
}

fn events(out: &[Published]) -> Vec<Value> {
    on(out, "/motor/status")
        .into_iter()
        .filter_map(|p| serde_json::from_str::<Value>(&p.payload).ok())
        .filter(|v| v.get("event").is_some())
        .collect()
}

fn finished(evs: &[FeedEvent]) -> bool {
    evs.iter().any(|e| matches!(e, FeedEvent::Finished { .. }))
}

#[test]
fn start_tares_and_announces_online() {
    let mut r = rig(fast_loop(), 5_000);
    r.bowl.set_grams(0.0);
    r.feeder.start();
    let out = r.bus.drain();
    let status = on(&out, "/status");
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].payload, "online");
    assert!(status[0].retain);
}

#[test]
fn manual_feed_over_the_bus_fills_to_target() {
    let mut r = rig(fast_loop(), 5_000);
    r.feeder.start();
    r.bowl.set_grams(20.0);
    r.bus.send(format!("{PREFIX}/motor/manual_feed"), r#"{"action":"feed","grams":10}"#);

    let stop = AtomicBool::new(false);
    let ticks = r.feeder.run_until(&stop, Some(200), finished);
    assert!(ticks < 200);
    assert_eq!(r.bowl.drive(), 0);
    assert!(r.bowl.grams() >= 30.0);
    assert_eq!(r.feeder.controller().last_outcome(), Some(FeedOutcome::Completed));

    let out = r.bus.drain();
    let names: Vec<String> = events(&out)
        .iter()
        .map(|v| v["event"].as_str().unwrap_or_default().to_owned())
        .collect();
    assert_eq!(names, vec!["started", "completed"]);
    let started = &events(&out)[0];
    assert_eq!(started["target_g"], 30.0);
    assert_eq!(started["origin"], "manual");

    let load = on(&out, "/loadcell");
    assert!(!load.is_empty());
    assert!(load.iter().all(|p| p.retain));
    let first: Value = serde_json::from_str(&load[0].payload).expect("loadcell json");
    assert_eq!(first["weight_g"], 20.0);
    assert_eq!(first["overload"], false);
}

#[test]
fn malformed_command_is_reported_and_fed_with_default() {
    let mut r = rig(fast_loop(), 5_000);
    r.feeder.start();
    r.bowl.set_grams(4.0);
    r.bus.send(format!("{PREFIX}/motor/manual_feed"), "not-json");

    let evs = r.feeder.tick();
    assert!(matches!(evs[0], FeedEvent::MalformedCommand { substituted_g: Some(g), .. } if g == 10.0));
    assert!(matches!(evs[1], FeedEvent::Started { target_g, .. } if target_g == 14.0));
    let names: Vec<Value> = events(&r.bus.drain());
    assert_eq!(names[0]["event"], "malformed_command");
}

#[test]
fn failing_scale_is_stopped_by_the_watchdog() {
    let mut r = rig(fast_loop(), 2_000);
    r.feeder.start();
    r.bowl.set_grams(1.0);
    r.bus.send(format!("{PREFIX}/motor/manual_feed"), r#"{"grams":500}"#);
    r.feeder.tick();
    assert_eq!(r.feeder.controller().state(), FeedState::Feeding);
    r.bowl.set_fail_reads(true);

    let stop = AtomicBool::new(false);
    let mut last = Vec::new();
    r.feeder.run_until(&stop, Some(100), |evs| {
        last = evs.to_vec();
        finished(evs)
    });
    match last.as_slice() {
        [FeedEvent::Finished {
            outcome, elapsed, ..
        }] => {
            assert_eq!(*outcome, FeedOutcome::Timeout);
            assert!(*elapsed >= Duration::from_secs(2));
            assert!(*elapsed <= Duration::from_millis(2_100));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(r.bowl.drive(), 0);
    assert!(!r.feeder.last_reading().valid);
}

#[test]
fn failed_boot_tare_is_taken_from_the_first_good_read() {
    let mut r = rig(fast_loop(), 5_000);
    r.bowl.set_grams(12.0);
    r.bowl.set_fail_reads(true);
    r.feeder.start();
    assert!(!r.feeder.load_cell().is_tared());

    r.bus.send(format!("{PREFIX}/motor/manual_feed"), r#"{"grams":10}"#);
    assert_eq!(
        r.feeder.tick(),
        vec![FeedEvent::Deferred {
            origin: feeder_core::FeedOrigin::Manual
        }]
    );
    r.bowl.set_fail_reads(false);
    // The recovering read becomes the zero; it is not reported as a weight.
    assert!(r.feeder.tick().is_empty());
    assert!(!r.feeder.last_reading().valid);
    assert!(r.feeder.load_cell().is_tared());

    let evs = r.feeder.tick();
    assert!(matches!(evs.as_slice(), [FeedEvent::Started { target_g, .. }] if *target_g == 10.0));
    assert_eq!(r.feeder.last_reading().grams, 0.0);
}

#[test]
fn shutdown_mid_feed_cancels_and_goes_offline() {
    let mut r = rig(fast_loop(), 5_000);
    r.feeder.start();
    r.bus.send(format!("{PREFIX}/motor/manual_feed"), r#"{"grams":50}"#);
    r.feeder.tick();
    assert!(r.bowl.drive() > 0);
    r.bus.drain();

    let ev = r.feeder.shutdown();
    assert!(matches!(
        ev,
        Some(FeedEvent::Finished {
            outcome: FeedOutcome::Cancelled,
            ..
        })
    ));
    assert_eq!(r.bowl.drive(), 0);
    let out = r.bus.drain();
    assert_eq!(events(&out)[0]["event"], "cancelled");
    let status = on(&out, "/status");
    assert_eq!(status.last().map(|p| p.payload.as_str()), Some("offline"));

    // A second shutdown has nothing left to stop.
    assert_eq!(r.feeder.shutdown(), None);
}

#[test]
fn inbound_commands_are_bounded_per_tick() {
    let cfg = LoopCfg {
        tick_ms: 100,
        max_commands_per_tick: 2,
        ..LoopCfg::default()
    };
    let mut r = rig(cfg, 5_000);
    r.feeder.start();
    for _ in 0..5 {
        r.bus.send(
            format!("{PREFIX}/motor/auto_feed_config"),
            r#"{"enabled":false}"#,
        );
    }
    let count = |evs: &[FeedEvent]| {
        evs.iter()
            .filter(|e| matches!(e, FeedEvent::Reconfigured { .. }))
            .count()
    };
    assert_eq!(count(&r.feeder.tick()), 2);
    assert_eq!(count(&r.feeder.tick()), 2);
    assert_eq!(count(&r.feeder.tick()), 1);
}

#[test]
fn scheduled_feed_fires_after_configured_interval() {
    let mut r = rig(fast_loop(), 5_000);
    r.feeder.start();
    r.bowl.set_grams(2.0);
    r.bus.send(
        format!("{PREFIX}/motor/auto_feed_config"),
        r#"{"enabled":true,"interval_minutes":1,"grams":8}"#,
    );
    let stop = AtomicBool::new(false);
    let ticks = r.feeder.run_until(&stop, Some(2_000), |evs| {
        evs.iter()
            .any(|e| matches!(e, FeedEvent::Started { .. }))
    });
    // 60 s at 100 ms per tick, plus the tick that took the config.
    assert!((600..=602).contains(&ticks), "fired after {ticks} ticks");
    assert_eq!(r.feeder.controller().session().map(|s| s.target_g()), Some(8.0));
}

#[test]
fn rejected_config_keeps_previous_schedule() {
    let mut r = rig(fast_loop(), 5_000);
    r.feeder.start();
    r.bus.send(
        format!("{PREFIX}/motor/auto_feed_config"),
        r#"{"enabled":true,"interval_minutes":5,"grams":30}"#,
    );
    r.bus.send(format!("{PREFIX}/motor/auto_feed_config"), "{oops");
    let evs = r.feeder.tick();
    assert!(matches!(evs[1], FeedEvent::ConfigRejected { .. }));
    let auto = r.feeder.controller().auto_feed();
    assert!(auto.enabled);
    assert_eq!(auto.interval, Duration::from_secs(300));
}

#[test]
fn ambient_sensors_publish_on_their_topics() {
    let bowl = SimulatedBowl::new(0.0, 1.0, 100.0);
    let (channel, bus) = memory_channel();
    let lid = SimulatedLid::default();
    let mut feeder = Feeder::builder()
        .with_weight_source(bowl.scale())
        .with_actuator(bowl.motor())
        .with_channel(channel)
        .with_clock(Arc::new(TestClock::new()))
        .with_topic_prefix(PREFIX)
        .with_climate_sensor(SimulatedClimate {
            humidity: 61.0,
            temperature: 22.5,
        })
        .with_range_sensor(SimulatedRange {
            distance_mm: Some(190),
        })
        .with_lid_switch(lid.clone())
        .build()
        .expect("build feeder");
    feeder.start();
    lid.press(true);
    feeder.tick();
    let out = bus.drain();

    let humid = on(&out, "/humid");
    let v: Value = serde_json::from_str(&humid[0].payload).expect("json");
    assert_eq!(v["humidity"], 61.0);
    assert_eq!(v["temperature"], 22.5);
    assert_eq!(on(&out, "/tof")[0].payload, r#"{"distance":190}"#);
    let ls = on(&out, "/ls");
    assert_eq!(ls[0].payload, r#"{"pressed":1}"#);
    assert!(!ls[0].retain);

    // Held button inside the cooldown is not re-published.
    feeder.tick();
    assert!(on(&bus.drain(), "/ls").is_empty());
}

#[test]
fn unknown_topics_are_ignored() {
    let mut r = rig(fast_loop(), 5_000);
    r.feeder.start();
    r.bus.send("/NomNom/other/motor/manual_feed", r#"{"grams":5}"#);
    assert!(r.feeder.tick().is_empty());
    assert_eq!(r.feeder.controller().state(), FeedState::Idle);
}

/// Scale that reads a fixed value until `stalled`, then blocks for the whole
/// timeout and fails.
struct StallingScale {
    clock: TestClock,
    stalled: Arc<AtomicBool>,
}

impl WeightSource for StallingScale {
    fn read(&mut self, timeout: Duration) -> Result<i32, BoxError> {
        if self.stalled.load(Ordering::Relaxed) {
            self.clock.advance(timeout);
            return Err("hx711 data ready timeout".into());
        }
        Ok(300)
    }
}

struct StallingClimate(TestClock);

impl ClimateSensor for StallingClimate {
    fn read(&mut self, timeout: Duration) -> Result<(f32, f32), BoxError> {
        self.0.advance(timeout);
        Err("dht timeout".into())
    }
}

struct StallingRange(TestClock);

impl RangeSensor for StallingRange {
    fn distance_mm(&mut self, timeout: Duration) -> Result<Option<u16>, BoxError> {
        self.0.advance(timeout);
        Err("tof timeout".into())
    }
}

/// Motor that logs every drive change with the clock reading at the time.
struct TimedMotor {
    clock: TestClock,
    log: Arc<Mutex<Vec<(Instant, u8)>>>,
}

impl Actuator for TimedMotor {
    fn set_drive(&mut self, level: u8) -> Result<(), BoxError> {
        self.log.lock().unwrap().push((self.clock.now(), level));
        Ok(())
    }
}

struct StallRig {
    feeder: Feeder<StallingScale, TimedMotor, MemoryChannel>,
    bus: ChannelHandle,
    clock: TestClock,
    stalled: Arc<AtomicBool>,
    log: Arc<Mutex<Vec<(Instant, u8)>>>,
}

fn stall_rig() -> StallRig {
    let clock = TestClock::new();
    let stalled = Arc::new(AtomicBool::new(false));
    let log = Arc::new(Mutex::new(Vec::new()));
    let (channel, bus) = memory_channel();
    let feeder = Feeder::builder()
        .with_weight_source(StallingScale {
            clock: clock.clone(),
            stalled: stalled.clone(),
        })
        .with_actuator(TimedMotor {
            clock: clock.clone(),
            log: log.clone(),
        })
        .with_channel(channel)
        .with_clock(Arc::new(clock.clone()))
        .with_loop(LoopCfg {
            tick_ms: 100,
            ..LoopCfg::default()
        })
        .with_timeouts(Timeouts { sensor_ms: 100 })
        .with_watchdog(WatchdogCfg { timeout_ms: 1_000 })
        .with_sensors(SensorCfg {
            climate_period_ms: 100,
            range_period_ms: 100,
            ..SensorCfg::default()
        })
        .with_load_cell(LoadCellCfg {
            counts_per_gram: 100.0,
            ..LoadCellCfg::default()
        })
        .with_climate_sensor(StallingClimate(clock.clone()))
        .with_range_sensor(StallingRange(clock.clone()))
        .with_topic_prefix(PREFIX)
        .build()
        .expect("build feeder");
    StallRig {
        feeder,
        bus,
        clock,
        stalled,
        log,
    }
}

#[test]
fn stalled_sensors_do_not_stretch_the_tick() {
    let mut r = stall_rig();
    r.feeder.start();
    r.stalled.store(true, Ordering::Relaxed);
    for _ in 0..5 {
        let before = r.clock.now();
        r.feeder.tick();
        let spent = r.clock.elapsed(before);
        assert!(spent <= Duration::from_millis(100), "tick took {spent:?}");
    }
}

#[test]
fn watchdog_bounds_drive_time_when_every_read_stalls() {
    let mut r = stall_rig();
    r.feeder.start();
    r.bus.send(format!("{PREFIX}/motor/manual_feed"), r#"{"grams":500}"#);
    let first = r.feeder.tick();
    assert!(matches!(first.as_slice(), [FeedEvent::Started { .. }]));
    r.stalled.store(true, Ordering::Relaxed);

    let stop = AtomicBool::new(false);
    let mut last = Vec::new();
    r.feeder.run_until(&stop, Some(100), |evs| {
        last = evs.to_vec();
        finished(evs)
    });
    assert!(matches!(
        last.as_slice(),
        [FeedEvent::Finished {
            outcome: FeedOutcome::Timeout,
            ..
        }]
    ));

    let log = r.log.lock().unwrap().clone();
    let on = log
        .iter()
        .find(|(_, level)| *level > 0)
        .map(|(at, _)| *at)
        .expect("motor was driven");
    let off = log
        .iter()
        .rev()
        .find(|(at, level)| *level == 0 && *at >= on)
        .map(|(at, _)| *at)
        .expect("motor was stopped");
    let driven = off.duration_since(on);
    assert!(driven >= Duration::from_millis(1_000), "stopped early after {driven:?}");
    assert!(driven <= Duration::from_millis(1_100), "drove for {driven:?}");
}
