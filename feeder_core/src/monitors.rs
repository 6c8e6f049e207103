//! Ambient sensors: climate probe, container level and lid switch.
//!
//! Each monitor is polled every tick and decides for itself whether a read
//! is due. A monitor is due on its first poll.
use std::time::{Duration, Instant};

use feeder_traits::{ClimateSensor, LidSwitch, RangeSensor};

use crate::hw_error::map_boxed;
use crate::telemetry::{ClimatePayload, LidPayload, RangePayload};

#[derive(Debug, Clone)]
struct Period {
    every: Duration,
    last: Option<Instant>,
}

impl Period {
    fn new(every: Duration) -> Self {
        Self { every, last: None }
    }

    fn is_due(&self, now: Instant) -> bool {
        self.last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.every)
    }

    /// Mark `now` as the last firing if due.
    fn fire(&mut self, now: Instant) -> bool {
        let due = self.is_due(now);
        if due {
            self.last = Some(now);
        }
        due
    }
}

/// Humidity and temperature, published every period.
#[derive(Debug, Clone)]
pub struct ClimateMonitor {
    period: Period,
}

impl ClimateMonitor {
    pub fn new(period: Duration) -> Self {
        Self {
            period: Period::new(period),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.period.is_due(now)
    }

    pub fn poll<S: ClimateSensor + ?Sized>(
        &mut self,
        sensor: &mut S,
        now: Instant,
        timeout: Duration,
    ) -> Option<ClimatePayload> {
        if !self.period.fire(now) {
            return None;
        }
        match sensor.read(timeout) {
            Ok((humidity, temperature)) if humidity.is_finite() && temperature.is_finite() => {
                tracing::debug!(humidity, temperature, "climate sample");
                Some(ClimatePayload {
                    humidity,
                    temperature,
                })
            }
            Ok(_) => {
                tracing::warn!("climate probe returned NaN");
                None
            }
            Err(e) => {
                tracing::warn!(error = %map_boxed(&e), "climate read failed");
                None
            }
        }
    }
}

/// Container fill level. Only an empty (or nearly empty) container is
/// reported.
#[derive(Debug, Clone)]
pub struct LevelMonitor {
    period: Period,
    empty_storage_mm: u16,
}

impl LevelMonitor {
    pub fn new(period: Duration, empty_storage_mm: u16) -> Self {
        Self {
            period: Period::new(period),
            empty_storage_mm,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.period.is_due(now)
    }

    pub fn poll<S: RangeSensor + ?Sized>(
        &mut self,
        sensor: &mut S,
        now: Instant,
        timeout: Duration,
    ) -> Option<RangePayload> {
        if !self.period.fire(now) {
            return None;
        }
        match sensor.distance_mm(timeout) {
            Ok(Some(distance)) if distance >= self.empty_storage_mm => {
                tracing::warn!(distance_mm = distance, "food storage running empty");
                Some(RangePayload { distance })
            }
            Ok(Some(distance)) => {
                tracing::trace!(distance_mm = distance, "container level ok");
                None
            }
            Ok(None) => {
                tracing::debug!("range sensor out of range");
                None
            }
            Err(e) => {
                tracing::warn!(error = %map_boxed(&e), "range read failed");
                None
            }
        }
    }
}

/// Lid/button presses, rate limited by a cooldown.
#[derive(Debug, Clone)]
pub struct LidMonitor {
    cooldown: Period,
}

impl LidMonitor {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: Period::new(cooldown),
        }
    }

    pub fn poll<S: LidSwitch + ?Sized>(&mut self, switch: &mut S, now: Instant) -> Option<LidPayload> {
        match switch.is_pressed() {
            Ok(true) if self.cooldown.fire(now) => {
                tracing::info!("lid switch pressed");
                Some(LidPayload::PRESSED)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %map_boxed(&e), "lid switch read failed");
                None
            }
        }
    }
}
