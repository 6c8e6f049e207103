use std::time::{Duration, Instant};

use serde::Serialize;

/// Who asked for the food.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedOrigin {
    /// One-shot request from the message bus; target is additive.
    Manual,
    /// Auto-feed schedule; target is an absolute top-up level.
    Scheduled,
}

impl FeedOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

/// A dispense in progress. Only `FeedController` creates or ends one.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedingSession {
    target_g: f32,
    started_at: Instant,
    origin: FeedOrigin,
}

impl FeedingSession {
    pub(crate) fn new(target_g: f32, started_at: Instant, origin: FeedOrigin) -> Self {
        Self {
            target_g: crate::util::clamp_grams(target_g),
            started_at,
            origin,
        }
    }

    pub fn target_g(&self) -> f32 {
        self.target_g
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn origin(&self) -> FeedOrigin {
        self.origin
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}
