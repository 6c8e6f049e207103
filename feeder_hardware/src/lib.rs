//! Device backends for the feeder.
//!
//! The simulated devices are always available and back the CLI by default
//! and the integration tests. With the `hardware` feature on Linux, the
//! `hardware` module drives an HX711 load cell, a PWM motor and the lid
//! switch through `rppal`.
pub mod error;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hardware;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;

use error::HwError;
use feeder_traits::{Actuator, BoxError, ClimateSensor, LidSwitch, RangeSensor, WeightSource};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
struct BowlState {
    grams: f32,
    drive: u8,
    fail_reads: bool,
}

/// Physical model shared by the simulated scale and motor: while the motor is
/// driven, every scale read adds `rate_g_per_read × drive/255` grams.
#[derive(Debug, Clone)]
pub struct SimulatedBowl {
    state: Arc<Mutex<BowlState>>,
    rate_g_per_read: f32,
    counts_per_gram: f32,
}

impl SimulatedBowl {
    pub fn new(start_g: f32, rate_g_per_read: f32, counts_per_gram: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(BowlState {
                grams: start_g.max(0.0),
                drive: 0,
                fail_reads: false,
            })),
            rate_g_per_read,
            counts_per_gram,
        }
    }

    pub fn scale(&self) -> SimulatedScale {
        SimulatedScale { bowl: self.clone() }
    }

    pub fn motor(&self) -> SimulatedMotor {
        SimulatedMotor { bowl: self.clone() }
    }

    pub fn grams(&self) -> f32 {
        self.with(|s| s.grams)
    }

    pub fn set_grams(&self, grams: f32) {
        self.with(|s| s.grams = grams.max(0.0));
    }

    pub fn drive(&self) -> u8 {
        self.with(|s| s.drive)
    }

    /// Make every subsequent scale read time out.
    pub fn set_fail_reads(&self, fail: bool) {
        self.with(|s| s.fail_reads = fail);
    }

    fn with<R>(&self, f: impl FnOnce(&mut BowlState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// Scale half of a [`SimulatedBowl`].
pub struct SimulatedScale {
    bowl: SimulatedBowl,
}

impl WeightSource for SimulatedScale {
    fn read(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        let rate = self.bowl.rate_g_per_read;
        let cpg = self.bowl.counts_per_gram;
        let grams = self.bowl.with(|s| {
            if s.fail_reads {
                return Err(HwError::Timeout);
            }
            if s.drive > 0 {
                s.grams += rate * f32::from(s.drive) / 255.0;
            }
            Ok(s.grams)
        })?;
        let raw = (grams * cpg).round();
        tracing::trace!(grams, raw, "simulated scale read");
        Ok(raw.clamp(i32::MIN as f32, i32::MAX as f32) as i32)
    }
}

/// Motor half of a [`SimulatedBowl`].
pub struct SimulatedMotor {
    bowl: SimulatedBowl,
}

impl Actuator for SimulatedMotor {
    fn set_drive(&mut self, level: u8) -> Result<(), BoxError> {
        let prev = self.bowl.with(|s| std::mem::replace(&mut s.drive, level));
        if prev != level {
            tracing::debug!(level, "simulated motor drive");
        }
        Ok(())
    }
}

/// Climate probe returning a fixed reading.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedClimate {
    pub humidity: f32,
    pub temperature: f32,
}

impl Default for SimulatedClimate {
    fn default() -> Self {
        Self {
            humidity: 55.0,
            temperature: 24.5,
        }
    }
}

impl ClimateSensor for SimulatedClimate {
    fn read(&mut self, _timeout: Duration) -> Result<(f32, f32), BoxError> {
        if self.humidity.is_nan() || self.temperature.is_nan() {
            return Err(Box::new(HwError::InvalidSample("climate probe returned NaN")));
        }
        Ok((self.humidity, self.temperature))
    }
}

/// Container ranger returning a fixed distance (`None` = out of range).
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedRange {
    pub distance_mm: Option<u16>,
}

impl RangeSensor for SimulatedRange {
    fn distance_mm(&mut self, _timeout: Duration) -> Result<Option<u16>, BoxError> {
        Ok(self.distance_mm)
    }
}

/// Lid switch whose state is shared with the test or CLI driving it.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLid {
    pressed: Arc<Mutex<bool>>,
}

impl SimulatedLid {
    pub fn press(&self, pressed: bool) {
        *self.pressed.lock().unwrap_or_else(PoisonError::into_inner) = pressed;
    }
}

impl LidSwitch for SimulatedLid {
    fn is_pressed(&mut self) -> Result<bool, BoxError> {
        Ok(*self.pressed.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
