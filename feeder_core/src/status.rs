//! Feed state and the events the controller emits on every decision.
use std::time::Duration;

use serde::Serialize;

use crate::session::FeedOrigin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedState {
    Idle,
    Feeding,
}

/// How the last feed decision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedOutcome {
    Completed,
    Timeout,
    Cancelled,
    Skipped,
}

impl FeedOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

/// Why a session is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    Watchdog,
    Cancelled,
}

impl From<StopReason> for FeedOutcome {
    fn from(r: StopReason) -> Self {
        match r {
            StopReason::TargetReached => Self::Completed,
            StopReason::Watchdog => Self::Timeout,
            StopReason::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Started {
        origin: FeedOrigin,
        target_g: f32,
        weight_g: f32,
    },
    Finished {
        outcome: FeedOutcome,
        origin: FeedOrigin,
        target_g: f32,
        /// Last known weight; `None` if the sensor was failing.
        weight_g: Option<f32>,
        elapsed: Duration,
    },
    /// No dispense needed: the bowl already holds the target, or 0 g was asked.
    Skipped {
        origin: FeedOrigin,
        weight_g: f32,
        target_g: f32,
    },
    /// Manual request discarded because a session is running.
    Rejected { requested_g: f32 },
    /// Pending manual request dropped before it started: cancelled, or
    /// replaced by a newer request.
    Withdrawn {
        requested_g: f32,
        superseded_by: Option<f32>,
    },
    /// A decision is waiting for a valid weight reading.
    Deferred { origin: FeedOrigin },
    Reconfigured {
        enabled: bool,
        interval_minutes: u64,
        target_g: f32,
    },
    ConfigRejected { reason: String },
    MalformedCommand {
        reason: String,
        /// Grams used in place of the unreadable payload, if any.
        substituted_g: Option<f32>,
    },
    CommandIgnored { reason: String },
}

impl FeedEvent {
    /// Stable event name used on the wire and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Finished { outcome, .. } => outcome.as_str(),
            Self::Skipped { .. } => "skipped",
            Self::Rejected { .. } => "rejected",
            Self::Withdrawn { .. } => "withdrawn",
            Self::Deferred { .. } => "deferred",
            Self::Reconfigured { .. } => "config_updated",
            Self::ConfigRejected { .. } => "config_rejected",
            Self::MalformedCommand { .. } => "malformed_command",
            Self::CommandIgnored { .. } => "ignored",
        }
    }
}
