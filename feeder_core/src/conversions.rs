//! `From` implementations bridging `feeder_config` types to `feeder_core` types.

use crate::config::{FeedCfg, LoadCellCfg, LoopCfg, MalformedPolicy, SensorCfg, Timeouts, WatchdogCfg};

impl From<feeder_config::MalformedPayload> for MalformedPolicy {
    fn from(p: feeder_config::MalformedPayload) -> Self {
        match p {
            feeder_config::MalformedPayload::FeedDefault => Self::FeedDefault,
            feeder_config::MalformedPayload::Ignore => Self::Ignore,
        }
    }
}

// ── FeedCfg ──────────────────────────────────────────────────────────────────

impl From<&feeder_config::Feed> for FeedCfg {
    fn from(c: &feeder_config::Feed) -> Self {
        Self {
            default_grams: c.default_grams,
            drive_level: c.drive_level,
            malformed: c.malformed_payload.into(),
        }
    }
}

// ── WatchdogCfg ──────────────────────────────────────────────────────────────

impl From<&feeder_config::Watchdog> for WatchdogCfg {
    fn from(c: &feeder_config::Watchdog) -> Self {
        Self {
            timeout_ms: c.timeout_ms,
        }
    }
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

impl From<&feeder_config::Timeouts> for Timeouts {
    fn from(c: &feeder_config::Timeouts) -> Self {
        Self {
            sensor_ms: c.sensor_ms,
        }
    }
}

// ── LoopCfg ──────────────────────────────────────────────────────────────────

impl From<&feeder_config::LoopCfg> for LoopCfg {
    fn from(c: &feeder_config::LoopCfg) -> Self {
        Self {
            tick_ms: c.tick_ms,
            telemetry_ms: c.telemetry_ms,
            max_commands_per_tick: c.max_commands_per_tick,
        }
    }
}

// ── LoadCellCfg ──────────────────────────────────────────────────────────────

impl From<&feeder_config::LoadCell> for LoadCellCfg {
    fn from(c: &feeder_config::LoadCell) -> Self {
        Self {
            counts_per_gram: c.counts_per_gram,
            max_weight_g: c.max_weight_g,
            tare_samples: c.tare_samples,
        }
    }
}

// ── SensorCfg ────────────────────────────────────────────────────────────────

impl From<&feeder_config::Sensors> for SensorCfg {
    fn from(c: &feeder_config::Sensors) -> Self {
        Self {
            climate_period_ms: c.climate_period_ms,
            range_period_ms: c.range_period_ms,
            empty_storage_mm: c.empty_storage_mm,
            switch_cooldown_ms: c.switch_cooldown_ms,
        }
    }
}
