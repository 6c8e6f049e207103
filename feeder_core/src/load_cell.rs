//! Raw counts → grams for the bowl load cell.
use std::time::Duration;

use feeder_traits::WeightSource;
use serde::Serialize;

use crate::config::LoadCellCfg;
use crate::hw_error::map_boxed;

/// Overload is flagged once the bowl exceeds its rating by this factor.
const OVERLOAD_FACTOR: f32 = 1.05;

/// One bowl-weight sample. `grams` is never negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightReading {
    pub grams: f32,
    /// Counts after tare.
    pub raw: i32,
    /// `false` when the sensor could not be read within its timeout.
    pub valid: bool,
}

impl WeightReading {
    pub fn valid(grams: f32, raw: i32) -> Self {
        Self {
            grams: crate::util::clamp_grams(grams),
            raw,
            valid: true,
        }
    }

    pub fn invalid() -> Self {
        Self {
            grams: 0.0,
            raw: 0,
            valid: false,
        }
    }

    /// Weight if known; an invalid reading is "unknown", never zero.
    pub fn known_grams(&self) -> Option<f32> {
        self.valid.then_some(self.grams)
    }
}

/// `{"weight_g", "raw", "overload"}` on `<prefix>/loadcell`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadCellPayload {
    pub weight_g: f32,
    pub raw: i32,
    pub overload: bool,
}

#[derive(Debug, Clone)]
pub struct LoadCell {
    counts_per_gram: f32,
    zero_counts: i32,
    max_weight_g: f32,
    /// No zero point yet; readings are not trusted until one is taken.
    tared: bool,
}

impl LoadCell {
    pub fn new(cfg: &LoadCellCfg) -> Self {
        Self {
            counts_per_gram: cfg.counts_per_gram,
            zero_counts: 0,
            max_weight_g: cfg.max_weight_g,
            tared: false,
        }
    }

    pub fn zero_counts(&self) -> i32 {
        self.zero_counts
    }

    pub fn set_zero_counts(&mut self, zero: i32) {
        self.zero_counts = zero;
        self.tared = true;
    }

    pub fn is_tared(&self) -> bool {
        self.tared
    }

    /// Grams for a raw sample, clamped at 0.
    pub fn to_grams(&self, raw: i32) -> f32 {
        let delta = i64::from(raw) - i64::from(self.zero_counts);
        #[allow(clippy::cast_precision_loss)]
        let g = delta as f32 / self.counts_per_gram;
        crate::util::clamp_grams(g)
    }

    /// Average `samples` reads and use it as the zero point.
    ///
    /// Failed reads are skipped; if none succeed the previous zero is kept
    /// and `false` is returned.
    pub fn tare<W: WeightSource + ?Sized>(
        &mut self,
        source: &mut W,
        samples: u8,
        timeout: Duration,
    ) -> bool {
        let mut sum: i64 = 0;
        let mut n: i64 = 0;
        for _ in 0..samples.max(1) {
            match source.read(timeout) {
                Ok(raw) => {
                    sum += i64::from(raw);
                    n += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %map_boxed(&e), "tare sample failed");
                }
            }
        }
        if n == 0 {
            if self.tared {
                tracing::warn!(zero_counts = self.zero_counts, "tare failed; keeping previous zero");
            } else {
                tracing::warn!("tare failed; zero will come from the first good read");
            }
            return false;
        }
        let avg = sum / n;
        self.zero_counts = i32::try_from(avg).unwrap_or(if avg < 0 { i32::MIN } else { i32::MAX });
        self.tared = true;
        tracing::info!(zero_counts = self.zero_counts, samples = n, "load cell tared");
        true
    }

    /// One bounded read. A failure degrades to an invalid reading.
    ///
    /// Before any tare has succeeded, the first good read becomes the zero
    /// point and that tick's reading is reported invalid.
    pub fn sample<W: WeightSource + ?Sized>(
        &mut self,
        source: &mut W,
        timeout: Duration,
    ) -> WeightReading {
        match source.read(timeout) {
            Ok(raw) if !self.tared => {
                self.set_zero_counts(raw);
                tracing::warn!(zero_counts = raw, "load cell tared late from first good read");
                WeightReading::invalid()
            }
            Ok(raw) => {
                let grams = self.to_grams(raw);
                let tared = raw.saturating_sub(self.zero_counts);
                tracing::trace!(raw, grams, "weight sample");
                WeightReading::valid(grams, tared)
            }
            Err(e) => {
                tracing::warn!(error = %map_boxed(&e), "weight read failed; weight unknown this tick");
                WeightReading::invalid()
            }
        }
    }

    /// Telemetry payload for a valid reading.
    pub fn payload(&self, reading: &WeightReading) -> Option<LoadCellPayload> {
        reading.valid.then(|| LoadCellPayload {
            weight_g: reading.grams,
            raw: reading.raw,
            overload: reading.grams > self.max_weight_g * OVERLOAD_FACTOR,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feeder_traits::BoxError;

    struct Seq(Vec<Result<i32, &'static str>>);

    impl WeightSource for Seq {
        fn read(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
            if self.0.is_empty() {
                return Err("timeout".into());
            }
            self.0.remove(0).map_err(Into::into)
        }
    }

    fn cell() -> LoadCell {
        LoadCell::new(&LoadCellCfg {
            counts_per_gram: 100.0,
            max_weight_g: 100.0,
            tare_samples: 3,
        })
    }

    #[test]
    fn grams_are_relative_to_zero_and_clamped() {
        let mut c = cell();
        c.set_zero_counts(1_000);
        assert_eq!(c.to_grams(3_000), 20.0);
        assert_eq!(c.to_grams(500), 0.0);
    }

    #[test]
    fn tare_averages_successful_samples() {
        let mut c = cell();
        let mut src = Seq(vec![Ok(90), Err("timeout"), Ok(110)]);
        assert!(c.tare(&mut src, 3, Duration::from_millis(1)));
        assert_eq!(c.zero_counts(), 100);
    }

    #[test]
    fn tare_with_no_samples_keeps_zero() {
        let mut c = cell();
        c.set_zero_counts(7);
        let mut src = Seq(vec![]);
        assert!(!c.tare(&mut src, 3, Duration::from_millis(1)));
        assert_eq!(c.zero_counts(), 7);
    }

    #[test]
    fn failed_read_is_invalid_not_zero() {
        let mut c = cell();
        c.set_zero_counts(0);
        let mut src = Seq(vec![Err("timeout")]);
        let r = c.sample(&mut src, Duration::from_millis(1));
        assert!(!r.valid);
        assert_eq!(r.known_grams(), None);
        assert_eq!(c.payload(&r), None);
    }

    #[test]
    fn untared_cell_tares_on_first_good_read() {
        let mut c = cell();
        let mut boot = Seq(vec![Err("timeout"), Err("timeout"), Err("timeout")]);
        assert!(!c.tare(&mut boot, 3, Duration::from_millis(1)));
        assert!(!c.is_tared());

        let mut src = Seq(vec![Err("timeout"), Ok(5_000), Ok(6_000)]);
        let t = Duration::from_millis(1);
        assert!(!c.sample(&mut src, t).valid);
        let first = c.sample(&mut src, t);
        assert!(!first.valid, "raw counts must not be reported as grams");
        assert!(c.is_tared());
        assert_eq!(c.zero_counts(), 5_000);
        let next = c.sample(&mut src, t);
        assert_eq!(next, WeightReading::valid(10.0, 1_000));
    }

    #[test]
    fn overload_above_rating_margin() {
        let c = cell();
        let at = c.payload(&WeightReading::valid(104.0, 10_400)).unwrap();
        assert!(!at.overload);
        let over = c.payload(&WeightReading::valid(106.0, 10_600)).unwrap();
        assert!(over.overload);
    }
}
