//! The cooperative tick loop (`Feeder`).
//!
//! One tick: drain a bounded number of inbound commands, take one bounded
//! weight sample, advance the controller, publish its events, then publish
//! periodic telemetry and poll the ambient sensors. Ambient reads that would
//! push the tick past its period wait for a later tick. No failure here is
//! fatal: bus and actuator errors are logged and the loop carries on.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use feeder_traits::clock::Clock;
use feeder_traits::{Actuator, ClimateSensor, CommandChannel, Inbound, LidSwitch, RangeSensor, WeightSource};
use serde::Serialize;

use crate::builder::{FeederBuilder, Missing};
use crate::command::{ManualCommand, parse_auto_feed, parse_manual_feed};
use crate::config::{FeedCfg, LoadCellCfg, LoopCfg, SensorCfg, Timeouts, WatchdogCfg};
use crate::controller::FeedController;
use crate::error::CommandError;
use crate::load_cell::{LoadCell, WeightReading};
use crate::monitors::{ClimateMonitor, LevelMonitor, LidMonitor};
use crate::status::{FeedEvent, StopReason};
use crate::telemetry::{EventPayload, OFFLINE, ONLINE, Route, StatusRecord, Topics};

/// Optional ambient sensors; any of them may be absent.
#[derive(Default)]
pub(crate) struct Ambient {
    pub(crate) climate: Option<Box<dyn ClimateSensor + Send>>,
    pub(crate) range: Option<Box<dyn RangeSensor + Send>>,
    pub(crate) lid: Option<Box<dyn LidSwitch + Send>>,
}

/// Everything the builder collects besides the three required collaborators.
pub(crate) struct Parts {
    pub(crate) feed: FeedCfg,
    pub(crate) watchdog: WatchdogCfg,
    pub(crate) timeouts: Timeouts,
    pub(crate) loop_cfg: LoopCfg,
    pub(crate) load_cell: LoadCellCfg,
    pub(crate) sensors: SensorCfg,
    pub(crate) topic_prefix: String,
    pub(crate) ambient: Ambient,
}

impl Default for Parts {
    fn default() -> Self {
        Self {
            feed: FeedCfg::default(),
            watchdog: WatchdogCfg::default(),
            timeouts: Timeouts::default(),
            loop_cfg: LoopCfg::default(),
            load_cell: LoadCellCfg::default(),
            sensors: SensorCfg::default(),
            topic_prefix: "/NomNom/device_001".into(),
            ambient: Ambient::default(),
        }
    }
}

pub struct Feeder<W, A, C> {
    weight: W,
    channel: C,
    controller: FeedController<A>,
    load_cell: LoadCell,
    clock: Arc<dyn Clock + Send + Sync>,
    topics: Topics,
    feed: FeedCfg,
    timeouts: Timeouts,
    loop_cfg: LoopCfg,
    tare_samples: u8,
    ambient: Ambient,
    climate: ClimateMonitor,
    level: LevelMonitor,
    lid: LidMonitor,
    last_reading: WeightReading,
    last_telemetry: Option<Instant>,
    ticks: u64,
}

impl Feeder<Missing, Missing, Missing> {
    pub fn builder() -> FeederBuilder<Missing, Missing, Missing> {
        FeederBuilder::new()
    }
}

impl<W: WeightSource, A: Actuator, C: CommandChannel> Feeder<W, A, C> {
    pub(crate) fn assemble(
        weight: W,
        actuator: A,
        channel: C,
        clock: Arc<dyn Clock + Send + Sync>,
        parts: Parts,
    ) -> Self {
        let now = clock.now();
        let s = &parts.sensors;
        Self {
            weight,
            channel,
            controller: FeedController::new(actuator, parts.feed.clone(), parts.watchdog, now),
            load_cell: LoadCell::new(&parts.load_cell),
            topics: Topics::new(&parts.topic_prefix),
            climate: ClimateMonitor::new(Duration::from_millis(s.climate_period_ms)),
            level: LevelMonitor::new(
                Duration::from_millis(s.range_period_ms),
                s.empty_storage_mm,
            ),
            lid: LidMonitor::new(Duration::from_millis(s.switch_cooldown_ms)),
            feed: parts.feed,
            timeouts: parts.timeouts,
            loop_cfg: parts.loop_cfg,
            tare_samples: parts.load_cell.tare_samples,
            ambient: parts.ambient,
            clock,
            last_reading: WeightReading::invalid(),
            last_telemetry: None,
            ticks: 0,
        }
    }

    pub fn controller(&self) -> &FeedController<A> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut FeedController<A> {
        &mut self.controller
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn load_cell(&self) -> &LoadCell {
        &self.load_cell
    }

    pub fn last_reading(&self) -> WeightReading {
        self.last_reading
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Boot sequence: make sure the actuator is off, tare the load cell and
    /// announce the device as online.
    pub fn start(&mut self) {
        if let Err(e) = self.controller.actuator_mut().stop() {
            tracing::warn!(error = %crate::hw_error::map_boxed(&e), "actuator stop at boot failed");
        }
        self.load_cell
            .tare(&mut self.weight, self.tare_samples, self.timeouts.sensor());
        publish(&mut self.channel, &self.topics.heartbeat, ONLINE, true);
        tracing::info!(prefix = %self.topics.heartbeat, "feeder online");
    }

    /// Run one tick and return the feed events it produced.
    pub fn tick(&mut self) -> Vec<FeedEvent> {
        let tick_start = self.clock.now();
        let mut events = Vec::new();

        for _ in 0..self.loop_cfg.max_commands_per_tick {
            let Some(msg) = self.channel.poll() else {
                break;
            };
            self.dispatch(&msg, tick_start, &mut events);
        }

        let reading = self
            .load_cell
            .sample(&mut self.weight, self.timeouts.sensor());
        self.last_reading = reading;
        // The read may have blocked; the watchdog must see time after it.
        let now = self.clock.now();
        events.extend(self.controller.tick(now, &reading));

        for ev in &events {
            publish_json(&mut self.channel, &self.topics.motor_status, &EventPayload::from(ev), false);
        }

        let telemetry_due = self
            .last_telemetry
            .is_none_or(|t| now.saturating_duration_since(t) >= self.loop_cfg.telemetry());
        if telemetry_due {
            self.last_telemetry = Some(now);
            if let Some(p) = self.load_cell.payload(&reading) {
                publish_json(&mut self.channel, &self.topics.loadcell, &p, true);
            }
            let status = StatusRecord::from_controller(&self.controller, now);
            publish_json(&mut self.channel, &self.topics.motor_status, &status, false);
        }

        self.poll_ambient(now, tick_start);
        self.ticks += 1;
        events
    }

    /// Tick until `shutdown` is raised, `max_ticks` have run, or `done`
    /// returns true for a tick's events. Sleeps out the rest of each tick.
    /// Returns the number of ticks run.
    pub fn run_until<F>(&mut self, shutdown: &AtomicBool, max_ticks: Option<u64>, mut done: F) -> u64
    where
        F: FnMut(&[FeedEvent]) -> bool,
    {
        let period = self.loop_cfg.tick();
        let mut n = 0u64;
        while !shutdown.load(Ordering::Relaxed) {
            let started = self.clock.now();
            let events = self.tick();
            n += 1;
            if done(&events) || max_ticks.is_some_and(|max| n >= max) {
                break;
            }
            let spent = self.clock.elapsed(started);
            self.clock.sleep(period.saturating_sub(spent));
        }
        n
    }

    /// Orderly shutdown: end any session as cancelled, stop the actuator and
    /// publish `offline`.
    pub fn shutdown(&mut self) -> Option<FeedEvent> {
        let now = self.clock.now();
        let ev = self.controller.stop(now, StopReason::Cancelled);
        if let Some(ev) = &ev {
            publish_json(&mut self.channel, &self.topics.motor_status, &EventPayload::from(ev), false);
        }
        publish(&mut self.channel, &self.topics.heartbeat, OFFLINE, true);
        tracing::info!("feeder offline");
        ev
    }

    fn dispatch(&mut self, msg: &Inbound, now: Instant, events: &mut Vec<FeedEvent>) {
        match self.topics.route(&msg.topic) {
            Route::ManualFeed => {
                match parse_manual_feed(&msg.payload, self.feed.malformed, self.feed.default_grams) {
                    ManualCommand::Feed { request, malformed } => {
                        if let Some(err) = malformed {
                            tracing::warn!(
                                error = %err,
                                substituted_g = request.grams,
                                "malformed manual feed; using default amount"
                            );
                            events.push(FeedEvent::MalformedCommand {
                                reason: err.to_string(),
                                substituted_g: Some(request.grams),
                            });
                        }
                        events.extend(self.controller.request_manual_feed(request));
                    }
                    ManualCommand::Cancel => {
                        if !self.controller.request_cancel() {
                            events.push(FeedEvent::CommandIgnored {
                                reason: "nothing to cancel".into(),
                            });
                        }
                    }
                    ManualCommand::Ignored(err @ CommandError::UnknownAction(_)) => {
                        tracing::warn!(error = %err, "manual feed command ignored");
                        events.push(FeedEvent::CommandIgnored {
                            reason: err.to_string(),
                        });
                    }
                    ManualCommand::Ignored(err) => {
                        tracing::warn!(error = %err, "malformed manual feed dropped");
                        events.push(FeedEvent::MalformedCommand {
                            reason: err.to_string(),
                            substituted_g: None,
                        });
                    }
                }
            }
            Route::AutoFeedConfig => match parse_auto_feed(&msg.payload) {
                Ok(update) => events.push(self.controller.configure_auto_feed(&update, now)),
                Err(err) => {
                    tracing::warn!(error = %err, "auto-feed config rejected; keeping current schedule");
                    events.push(FeedEvent::ConfigRejected {
                        reason: err.to_string(),
                    });
                }
            },
            Route::Unknown => {
                tracing::debug!(topic = %msg.topic, "message on unknown topic ignored");
            }
        }
    }

    /// A blocking read that could overrun the tick is put off to a later
    /// tick. A skipped monitor stays due.
    fn fits_in_tick(&self, tick_start: Instant, timeout: Duration) -> bool {
        let fits = self.clock.elapsed(tick_start) + timeout <= self.loop_cfg.tick();
        if !fits {
            tracing::debug!(
                spent_ms = self.clock.elapsed(tick_start).as_millis() as u64,
                "tick budget spent; ambient read deferred"
            );
        }
        fits
    }

    fn poll_ambient(&mut self, now: Instant, tick_start: Instant) {
        let timeout = self.timeouts.sensor();
        if self.ambient.climate.is_some()
            && self.climate.is_due(now)
            && self.fits_in_tick(tick_start, timeout)
        {
            let now = self.clock.now().max(now);
            if let Some(sensor) = self.ambient.climate.as_deref_mut()
                && let Some(p) = self.climate.poll(sensor, now, timeout)
            {
                publish_json(&mut self.channel, &self.topics.climate, &p, true);
            }
        }
        if self.ambient.range.is_some()
            && self.level.is_due(now)
            && self.fits_in_tick(tick_start, timeout)
        {
            let now = self.clock.now().max(now);
            if let Some(sensor) = self.ambient.range.as_deref_mut()
                && let Some(p) = self.level.poll(sensor, now, timeout)
            {
                publish_json(&mut self.channel, &self.topics.range, &p, true);
            }
        }
        if let Some(switch) = self.ambient.lid.as_deref_mut()
            && let Some(p) = self.lid.poll(switch, now)
        {
            publish_json(&mut self.channel, &self.topics.lid, &p, false);
        }
    }
}

fn publish<C: CommandChannel>(channel: &mut C, topic: &str, payload: &str, retain: bool) {
    if let Err(e) = channel.publish(topic, payload, retain) {
        tracing::warn!(error = %e, topic, "publish failed");
    }
}

fn publish_json<C: CommandChannel, T: Serialize>(channel: &mut C, topic: &str, value: &T, retain: bool) {
    match serde_json::to_string(value) {
        Ok(payload) => publish(channel, topic, &payload, retain),
        Err(e) => tracing::warn!(error = %e, topic, "payload serialization failed"),
    }
}
