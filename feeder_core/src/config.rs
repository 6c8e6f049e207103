//! Runtime configuration for the feed controller and the tick loop.
//!
//! These are separate from the TOML-deserialized config in `feeder_config`;
//! see `conversions` for the bridge.
use std::time::Duration;

/// How a manual-feed payload that cannot be parsed is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Dispense `FeedCfg::default_grams` anyway.
    #[default]
    FeedDefault,
    /// Drop the command and report it.
    Ignore,
}

#[derive(Debug, Clone)]
pub struct FeedCfg {
    /// Grams used when a manual request carries no usable amount.
    pub default_grams: f32,
    /// Actuator level asserted while a session is active.
    pub drive_level: u8,
    pub malformed: MalformedPolicy,
}

impl Default for FeedCfg {
    fn default() -> Self {
        Self {
            default_grams: 10.0,
            drive_level: 255,
            malformed: MalformedPolicy::FeedDefault,
        }
    }
}

/// Hard cap on a single dispensing session.
#[derive(Debug, Clone)]
pub struct WatchdogCfg {
    pub timeout_ms: u64,
}

impl WatchdogCfg {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for WatchdogCfg {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Timeouts for device reads.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Max sensor wait per read (ms).
    pub sensor_ms: u64,
}

impl Timeouts {
    pub fn sensor(&self) -> Duration {
        Duration::from_millis(self.sensor_ms)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct LoopCfg {
    pub tick_ms: u64,
    /// Cadence of load-cell and status publications.
    pub telemetry_ms: u64,
    /// Inbound messages handled per tick; the rest wait for the next one.
    pub max_commands_per_tick: usize,
}

impl LoopCfg {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn telemetry(&self) -> Duration {
        Duration::from_millis(self.telemetry_ms)
    }
}

impl Default for LoopCfg {
    fn default() -> Self {
        Self {
            tick_ms: 200,
            telemetry_ms: 1_000,
            max_commands_per_tick: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadCellCfg {
    pub counts_per_gram: f32,
    pub max_weight_g: f32,
    pub tare_samples: u8,
}

impl Default for LoadCellCfg {
    fn default() -> Self {
        Self {
            counts_per_gram: 100_000.0,
            max_weight_g: 1_000.0,
            tare_samples: 3,
        }
    }
}

/// Periods for the ambient monitors.
#[derive(Debug, Clone)]
pub struct SensorCfg {
    pub climate_period_ms: u64,
    pub range_period_ms: u64,
    pub empty_storage_mm: u16,
    pub switch_cooldown_ms: u64,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            climate_period_ms: 5_000,
            range_period_ms: 1_000,
            empty_storage_mm: 150,
            switch_cooldown_ms: 2_000,
        }
    }
}
