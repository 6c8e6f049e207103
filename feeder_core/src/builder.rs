//! Typestate builder for [`Feeder`].
//!
//! The weight source, actuator and message channel start out as [`Missing`];
//! `build()` only exists once all three have been supplied, so a missing
//! collaborator is a compile error rather than a runtime one. Timing and
//! calibration values are checked at `build()`.
use std::sync::Arc;

use feeder_traits::clock::{Clock, MonotonicClock};
use feeder_traits::{Actuator, ClimateSensor, CommandChannel, LidSwitch, RangeSensor, WeightSource};

use crate::config::{FeedCfg, LoadCellCfg, LoopCfg, SensorCfg, Timeouts, WatchdogCfg};
use crate::error::{BuildError, Result};
use crate::runner::{Feeder, Parts};

// ── Type-state marker ────────────────────────────────────────────────────────

/// Placeholder for a collaborator that has not been supplied yet.
pub struct Missing;

pub struct FeederBuilder<W, A, C> {
    weight: W,
    actuator: A,
    channel: C,
    settings: Parts,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl Default for FeederBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            weight: Missing,
            actuator: Missing,
            channel: Missing,
            settings: Parts::default(),
            clock: None,
        }
    }
}

impl FeederBuilder<Missing, Missing, Missing> {
    pub fn new() -> Self {
        Self::default()
    }
}

// Setters that advance type-state
impl<A, C> FeederBuilder<Missing, A, C> {
    pub fn with_weight_source<W: WeightSource>(self, weight: W) -> FeederBuilder<W, A, C> {
        FeederBuilder {
            weight,
            actuator: self.actuator,
            channel: self.channel,
            settings: self.settings,
            clock: self.clock,
        }
    }
}

impl<W, C> FeederBuilder<W, Missing, C> {
    pub fn with_actuator<A: Actuator>(self, actuator: A) -> FeederBuilder<W, A, C> {
        FeederBuilder {
            weight: self.weight,
            actuator,
            channel: self.channel,
            settings: self.settings,
            clock: self.clock,
        }
    }
}

impl<W, A> FeederBuilder<W, A, Missing> {
    pub fn with_channel<C: CommandChannel>(self, channel: C) -> FeederBuilder<W, A, C> {
        FeederBuilder {
            weight: self.weight,
            actuator: self.actuator,
            channel,
            settings: self.settings,
            clock: self.clock,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<W, A, C> FeederBuilder<W, A, C> {
    pub fn with_feed(mut self, feed: FeedCfg) -> Self {
        self.settings.feed = feed;
        self
    }
    pub fn with_watchdog(mut self, watchdog: WatchdogCfg) -> Self {
        self.settings.watchdog = watchdog;
        self
    }
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.settings.timeouts = timeouts;
        self
    }
    pub fn with_loop(mut self, loop_cfg: LoopCfg) -> Self {
        self.settings.loop_cfg = loop_cfg;
        self
    }
    pub fn with_load_cell(mut self, load_cell: LoadCellCfg) -> Self {
        self.settings.load_cell = load_cell;
        self
    }
    pub fn with_sensors(mut self, sensors: SensorCfg) -> Self {
        self.settings.sensors = sensors;
        self
    }
    /// `<topic_base>/<device_id>`.
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.topic_prefix = prefix.into();
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    pub fn with_climate_sensor(mut self, sensor: impl ClimateSensor + Send + 'static) -> Self {
        self.settings.ambient.climate = Some(Box::new(sensor));
        self
    }
    pub fn with_range_sensor(mut self, sensor: impl RangeSensor + Send + 'static) -> Self {
        self.settings.ambient.range = Some(Box::new(sensor));
        self
    }
    pub fn with_lid_switch(mut self, switch: impl LidSwitch + Send + 'static) -> Self {
        self.settings.ambient.lid = Some(Box::new(switch));
        self
    }

    /// Apply every section of a loaded config file.
    pub fn with_config(self, cfg: &feeder_config::Config) -> Self {
        self.with_feed((&cfg.feed).into())
            .with_watchdog((&cfg.watchdog).into())
            .with_timeouts((&cfg.timeouts).into())
            .with_loop((&cfg.loop_cfg).into())
            .with_load_cell((&cfg.load_cell).into())
            .with_sensors((&cfg.sensors).into())
            .with_topic_prefix(cfg.topic_prefix())
    }
}

impl<W: WeightSource, A: Actuator, C: CommandChannel> FeederBuilder<W, A, C> {
    /// Validate and build the loop. Only available once all three
    /// collaborators are set.
    pub fn build(self) -> Result<Feeder<W, A, C>> {
        validate(&self.settings).map_err(eyre::Report::new)?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        Ok(Feeder::assemble(
            self.weight,
            self.actuator,
            self.channel,
            clock,
            self.settings,
        ))
    }
}

fn validate(s: &Parts) -> std::result::Result<(), BuildError> {
    let g = s.feed.default_grams;
    if !g.is_finite() || g < 0.0 {
        return Err(BuildError::InvalidConfig("default_grams must be finite and >= 0"));
    }
    if s.feed.drive_level == 0 {
        return Err(BuildError::InvalidConfig("drive_level must be > 0"));
    }
    if s.watchdog.timeout_ms == 0 {
        return Err(BuildError::InvalidConfig("watchdog timeout_ms must be >= 1"));
    }
    if s.loop_cfg.tick_ms == 0 {
        return Err(BuildError::InvalidConfig("tick_ms must be >= 1"));
    }
    if s.loop_cfg.tick_ms.saturating_mul(10) > s.watchdog.timeout_ms {
        return Err(BuildError::InvalidConfig(
            "tick_ms must be at most 1/10 of the watchdog timeout",
        ));
    }
    if s.loop_cfg.telemetry_ms == 0 {
        return Err(BuildError::InvalidConfig("telemetry_ms must be >= 1"));
    }
    if s.loop_cfg.max_commands_per_tick == 0 {
        return Err(BuildError::InvalidConfig("max_commands_per_tick must be >= 1"));
    }
    if s.timeouts.sensor_ms == 0 || s.timeouts.sensor_ms > s.loop_cfg.tick_ms {
        return Err(BuildError::InvalidConfig("sensor_ms must be in [1, tick_ms]"));
    }
    let cpg = s.load_cell.counts_per_gram;
    if !cpg.is_finite() || cpg == 0.0 {
        return Err(BuildError::InvalidConfig("counts_per_gram must be finite and non-zero"));
    }
    let max = s.load_cell.max_weight_g;
    if !max.is_finite() || max <= 0.0 {
        return Err(BuildError::InvalidConfig("max_weight_g must be > 0"));
    }
    if s.topic_prefix.trim().is_empty() {
        return Err(BuildError::InvalidConfig("topic prefix must not be empty"));
    }
    Ok(())
}
