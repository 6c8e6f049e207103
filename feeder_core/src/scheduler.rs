//! Periodic "top up the bowl" schedule.
//!
//! The schedule is a pure function of its config and the current time; the
//! controller evaluates it once per tick while idle.
use std::time::{Duration, Instant};

use crate::command::AutoFeedUpdate;
use crate::util::{clamp_grams, minutes_to_duration};

#[derive(Debug, Clone, PartialEq)]
pub struct AutoFeedConfig {
    pub enabled: bool,
    pub interval: Duration,
    /// Absolute level to top up to.
    pub target_g: f32,
    pub last_fed_at: Instant,
}

impl AutoFeedConfig {
    /// Boot defaults: disabled, one hour, 10 g.
    pub fn disabled(now: Instant) -> Self {
        let d = AutoFeedUpdate::default();
        Self {
            enabled: d.enabled,
            interval: minutes_to_duration(d.interval_minutes),
            target_g: d.grams,
            last_fed_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduleDecision {
    NotDue,
    Feed { weight_g: f32, target_g: f32 },
    /// Bowl already holds at least the target; the interval restarts.
    Skip { weight_g: f32, target_g: f32 },
    /// Due, but the weight is unknown. Re-evaluated next tick.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct AutoFeedScheduler {
    cfg: AutoFeedConfig,
}

impl AutoFeedScheduler {
    pub fn new(now: Instant) -> Self {
        Self {
            cfg: AutoFeedConfig::disabled(now),
        }
    }

    pub fn config(&self) -> &AutoFeedConfig {
        &self.cfg
    }

    /// Replace the schedule. Interval counting restarts at `now`.
    pub fn reconfigure(&mut self, update: &AutoFeedUpdate, now: Instant) {
        self.cfg = AutoFeedConfig {
            enabled: update.enabled,
            interval: minutes_to_duration(update.interval_minutes),
            target_g: clamp_grams(update.grams),
            last_fed_at: now,
        };
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.cfg.enabled
            && !self.cfg.interval.is_zero()
            && now.saturating_duration_since(self.cfg.last_fed_at) >= self.cfg.interval
    }

    pub fn evaluate(&mut self, now: Instant, weight_g: Option<f32>) -> ScheduleDecision {
        if !self.is_due(now) {
            return ScheduleDecision::NotDue;
        }
        let Some(w) = weight_g else {
            return ScheduleDecision::Deferred;
        };
        self.cfg.last_fed_at = now;
        let target_g = self.cfg.target_g;
        if w < target_g {
            ScheduleDecision::Feed {
                weight_g: w,
                target_g,
            }
        } else {
            ScheduleDecision::Skip {
                weight_g: w,
                target_g,
            }
        }
    }
}
