//! Topic layout and outbound payloads.
//!
//! Everything here is a pure projection of controller or sensor state into
//! JSON; publishing is the runner's job.
use std::time::Instant;

use feeder_traits::Actuator;
use serde::Serialize;

use crate::controller::FeedController;
use crate::status::{FeedEvent, FeedOutcome, FeedState};
use crate::util::duration_ms;

/// Payload published on the heartbeat topic while the loop is up.
pub const ONLINE: &str = "online";
/// Payload published on the heartbeat topic on an orderly shutdown.
pub const OFFLINE: &str = "offline";

/// Where a message should go, or where an inbound one came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ManualFeed,
    AutoFeedConfig,
    Unknown,
}

/// Full topic names for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub manual_feed: String,
    pub auto_feed_config: String,
    pub loadcell: String,
    pub climate: String,
    pub range: String,
    pub lid: String,
    pub motor_status: String,
    pub heartbeat: String,
}

impl Topics {
    /// `prefix` is `<topic_base>/<device_id>`.
    pub fn new(prefix: &str) -> Self {
        let p = prefix.trim_end_matches('/');
        Self {
            manual_feed: format!("{p}/motor/manual_feed"),
            auto_feed_config: format!("{p}/motor/auto_feed_config"),
            loadcell: format!("{p}/loadcell"),
            climate: format!("{p}/humid"),
            range: format!("{p}/tof"),
            lid: format!("{p}/ls"),
            motor_status: format!("{p}/motor/status"),
            heartbeat: format!("{p}/status"),
        }
    }

    pub fn route(&self, topic: &str) -> Route {
        if topic == self.manual_feed {
            Route::ManualFeed
        } else if topic == self.auto_feed_config {
            Route::AutoFeedConfig
        } else {
            Route::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClimatePayload {
    pub humidity: f32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangePayload {
    pub distance: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LidPayload {
    pub pressed: u8,
}

impl LidPayload {
    pub const PRESSED: Self = Self { pressed: 1 };
}

/// Periodic snapshot of the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    pub state: FeedState,
    /// `null` while the weight is unknown.
    pub weight_g: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_g: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    pub last_outcome: Option<FeedOutcome>,
    pub auto_feed_enabled: bool,
}

impl StatusRecord {
    pub fn from_controller<A: Actuator>(c: &FeedController<A>, now: Instant) -> Self {
        let session = c.session();
        Self {
            state: c.state(),
            weight_g: c.last_weight(),
            target_g: session.map(|s| s.target_g()),
            elapsed_ms: session.map(|s| duration_ms(s.elapsed(now))),
            last_outcome: c.last_outcome(),
            auto_feed_enabled: c.auto_feed().enabled,
        }
    }
}

/// One feed decision on the motor status topic. Consumers must tolerate
/// additional fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventPayload {
    pub event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_g: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_g: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_g: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EventPayload {
    fn named(event: &'static str) -> Self {
        Self {
            event,
            origin: None,
            weight_g: None,
            target_g: None,
            elapsed_ms: None,
            requested_g: None,
            enabled: None,
            interval_minutes: None,
            reason: None,
        }
    }
}

impl From<&FeedEvent> for EventPayload {
    fn from(ev: &FeedEvent) -> Self {
        let mut p = Self::named(ev.name());
        match ev {
            FeedEvent::Started {
                origin,
                target_g,
                weight_g,
            } => {
                p.origin = Some(origin.as_str());
                p.target_g = Some(*target_g);
                p.weight_g = Some(*weight_g);
            }
            FeedEvent::Finished {
                origin,
                target_g,
                weight_g,
                elapsed,
                ..
            } => {
                p.origin = Some(origin.as_str());
                p.target_g = Some(*target_g);
                p.weight_g = *weight_g;
                p.elapsed_ms = Some(duration_ms(*elapsed));
            }
            FeedEvent::Skipped {
                origin,
                weight_g,
                target_g,
            } => {
                p.origin = Some(origin.as_str());
                p.weight_g = Some(*weight_g);
                p.target_g = Some(*target_g);
                p.reason = Some("sufficient stock".into());
            }
            FeedEvent::Rejected { requested_g } => {
                p.requested_g = Some(*requested_g);
                p.reason = Some("already feeding".into());
            }
            FeedEvent::Withdrawn {
                requested_g,
                superseded_by,
            } => {
                p.requested_g = Some(*requested_g);
                p.target_g = *superseded_by;
                p.reason = Some(if superseded_by.is_some() { "superseded" } else { "cancelled" }.into());
            }
            FeedEvent::Deferred { origin } => {
                p.origin = Some(origin.as_str());
                p.reason = Some("weight unknown".into());
            }
            FeedEvent::Reconfigured {
                enabled,
                interval_minutes,
                target_g,
            } => {
                p.enabled = Some(*enabled);
                p.interval_minutes = Some(*interval_minutes);
                p.target_g = Some(*target_g);
            }
            FeedEvent::ConfigRejected { reason } | FeedEvent::CommandIgnored { reason } => {
                p.reason = Some(reason.clone());
            }
            FeedEvent::MalformedCommand {
                reason,
                substituted_g,
            } => {
                p.reason = Some(reason.clone());
                p.requested_g = *substituted_g;
            }
        }
        p
    }
}
