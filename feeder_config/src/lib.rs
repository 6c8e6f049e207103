#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the feeder.
//!
//! Every section is optional and falls back to the device defaults, so an
//! empty file is a valid config. `Config::validate` enforces the timing
//! bounds the control loop relies on (tick period well below the watchdog,
//! sensor read budget inside the tick).
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Device {
    /// Unique device identifier; part of every topic.
    pub id: String,
    /// Topic root shared by all devices.
    pub topic_base: String,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            id: "device_001".into(),
            topic_base: "/NomNom".into(),
        }
    }
}

/// What to do with a manual-feed payload that is not valid JSON.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPayload {
    /// Fail open: dispense `default_grams` anyway.
    #[default]
    FeedDefault,
    /// Fail closed: drop the command.
    Ignore,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Feed {
    /// Grams used when a manual request carries no usable amount.
    pub default_grams: f32,
    /// Actuator drive level while feeding (1..=255).
    pub drive_level: u8,
    pub malformed_payload: MalformedPayload,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            default_grams: 10.0,
            drive_level: 255,
            malformed_payload: MalformedPayload::FeedDefault,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Watchdog {
    /// Hard cap on a single dispensing session.
    pub timeout_ms: u64,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Per-read sensor budget. Also accepts alias "sample_ms".
    #[serde(alias = "sample_ms")]
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 100 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoopCfg {
    /// Tick period of the cooperative loop.
    pub tick_ms: u64,
    /// Cadence of weight and status telemetry.
    pub telemetry_ms: u64,
    /// Upper bound on inbound messages handled in one tick.
    pub max_commands_per_tick: usize,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoadCell {
    /// Raw counts per gram after tare.
    pub counts_per_gram: f32,
    /// Rated bowl capacity; readings beyond 105% are flagged as overload.
    pub max_weight_g: f32,
    /// Samples averaged for the boot-time tare.
    pub tare_samples: u8,
}

impl Default for LoadCell {
    fn default() -> Self {
        Self {
            counts_per_gram: 100_000.0,
            max_weight_g: 1_000.0,
            tare_samples: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sensors {
    pub climate_period_ms: u64,
    pub range_period_ms: u64,
    /// Container reads as empty once the ranger sees at least this far.
    pub empty_storage_mm: u16,
    /// Minimum spacing between two lid-switch publications.
    pub switch_cooldown_ms: u64,
}

impl Default for Sensors {
    fn default() -> Self {
        Self {
            climate_period_ms: 5_000,
            range_period_ms: 1_000,
            empty_storage_mm: 150,
            switch_cooldown_ms: 2_000,
        }
    }
}

/// GPIO assignment; only read by the `hardware` backend.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Pins {
    pub hx711_dt: Option<u8>,
    pub hx711_sck: Option<u8>,
    pub motor_pwm: Option<u8>,
    pub lid_switch: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub device: Device,
    pub feed: Feed,
    pub watchdog: Watchdog,
    pub timeouts: Timeouts,
    #[serde(rename = "loop")]
    pub loop_cfg: LoopCfg,
    pub load_cell: LoadCell,
    pub sensors: Sensors,
    pub pins: Pins,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    /// `<topic_base>/<id>`, the prefix every subtopic hangs off.
    pub fn topic_prefix(&self) -> String {
        format!(
            "{}/{}",
            self.device.topic_base.trim_end_matches('/'),
            self.device.id
        )
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        if self.device.id.trim().is_empty() {
            eyre::bail!("device.id must not be empty");
        }
        if self.device.id.contains(['/', '#', '+']) {
            eyre::bail!("device.id must not contain '/', '#' or '+'");
        }

        // Feed
        let g = self.feed.default_grams;
        if !g.is_finite() || !(0.0..=5000.0).contains(&g) {
            eyre::bail!("feed.default_grams must be in [0, 5000]");
        }
        if self.feed.drive_level == 0 {
            eyre::bail!("feed.drive_level must be > 0");
        }

        // Watchdog and loop timing
        if self.watchdog.timeout_ms == 0 {
            eyre::bail!("watchdog.timeout_ms must be >= 1");
        }
        if self.watchdog.timeout_ms > 10 * 60 * 1000 {
            eyre::bail!("watchdog.timeout_ms is unreasonably large (>10min)");
        }
        if self.loop_cfg.tick_ms == 0 {
            eyre::bail!("loop.tick_ms must be >= 1");
        }
        if self.loop_cfg.tick_ms.saturating_mul(10) > self.watchdog.timeout_ms {
            eyre::bail!("loop.tick_ms must be at most 1/10 of watchdog.timeout_ms");
        }
        if self.loop_cfg.telemetry_ms == 0 {
            eyre::bail!("loop.telemetry_ms must be >= 1");
        }
        if self.loop_cfg.max_commands_per_tick == 0 {
            eyre::bail!("loop.max_commands_per_tick must be >= 1");
        }

        // Timeouts
        if self.timeouts.sensor_ms == 0 {
            eyre::bail!("timeouts.sensor_ms must be >= 1");
        }
        if self.timeouts.sensor_ms > self.loop_cfg.tick_ms {
            eyre::bail!("timeouts.sensor_ms must not exceed loop.tick_ms");
        }

        // Load cell
        let cpg = self.load_cell.counts_per_gram;
        if !cpg.is_finite() || cpg == 0.0 {
            eyre::bail!("load_cell.counts_per_gram must be finite and non-zero");
        }
        let max = self.load_cell.max_weight_g;
        if !max.is_finite() || max <= 0.0 {
            eyre::bail!("load_cell.max_weight_g must be > 0");
        }

        // Sensors
        if self.sensors.climate_period_ms == 0 {
            eyre::bail!("sensors.climate_period_ms must be >= 1");
        }
        if self.sensors.range_period_ms == 0 {
            eyre::bail!("sensors.range_period_ms must be >= 1");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
