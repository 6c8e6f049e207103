//! Inbound command payloads.
//!
//! Both parsers are total: they never panic on arbitrary input and fall back
//! to the documented defaults field by field, so a partially filled payload
//! still does something predictable.
use serde_json::{Map, Value};

use crate::config::MalformedPolicy;
use crate::error::CommandError;
use crate::util::clamp_grams;

pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;
pub const DEFAULT_AUTO_GRAMS: f32 = 10.0;

/// A one-shot "add this much" request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualFeedRequest {
    /// Grams to add on top of the current bowl weight; never negative.
    pub grams: f32,
}

impl ManualFeedRequest {
    pub fn new(grams: f32) -> Self {
        Self {
            grams: clamp_grams(grams),
        }
    }
}

/// Outcome of parsing a `motor/manual_feed` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ManualCommand {
    Feed {
        request: ManualFeedRequest,
        /// Set when the payload was unusable and the default was substituted.
        malformed: Option<CommandError>,
    },
    Cancel,
    Ignored(CommandError),
}

/// New auto-feed settings from a `motor/auto_feed_config` payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoFeedUpdate {
    pub enabled: bool,
    pub interval_minutes: u64,
    /// Absolute top-up level; never negative.
    pub grams: f32,
}

impl Default for AutoFeedUpdate {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            grams: DEFAULT_AUTO_GRAMS,
        }
    }
}

fn object(payload: &str) -> Result<Map<String, Value>, CommandError> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CommandError::NotAnObject),
        Err(e) => Err(CommandError::Malformed(e.to_string())),
    }
}

fn grams_field(map: &Map<String, Value>, default: f32) -> f32 {
    #[allow(clippy::cast_possible_truncation)]
    let g = map
        .get("grams")
        .and_then(Value::as_f64)
        .map_or(default, |g| g as f32);
    clamp_grams(g)
}

/// Parse a manual-feed payload such as `{"action":"feed","grams":12}`.
///
/// `action` defaults to `"feed"`; a missing or non-numeric `grams` falls
/// back to `default_grams`. What happens to a payload that is not a JSON
/// object at all is decided by `policy`.
pub fn parse_manual_feed(payload: &str, policy: MalformedPolicy, default_grams: f32) -> ManualCommand {
    let map = match object(payload) {
        Ok(map) => map,
        Err(err) => {
            return match policy {
                MalformedPolicy::FeedDefault => ManualCommand::Feed {
                    request: ManualFeedRequest::new(default_grams),
                    malformed: Some(err),
                },
                MalformedPolicy::Ignore => ManualCommand::Ignored(err),
            };
        }
    };

    let action = map.get("action").and_then(Value::as_str).unwrap_or("feed");
    match action {
        "feed" => ManualCommand::Feed {
            request: ManualFeedRequest::new(grams_field(&map, default_grams)),
            malformed: None,
        },
        "cancel" => ManualCommand::Cancel,
        other => ManualCommand::Ignored(CommandError::UnknownAction(other.to_owned())),
    }
}

/// Parse an auto-feed config payload such as
/// `{"enabled":true,"interval_minutes":30,"grams":40}`.
///
/// A payload that is not a JSON object is rejected; the current schedule is
/// then left untouched. Missing or mistyped fields take their defaults.
pub fn parse_auto_feed(payload: &str) -> Result<AutoFeedUpdate, CommandError> {
    let map = object(payload)?;
    let defaults = AutoFeedUpdate::default();

    let enabled = map
        .get("enabled")
        .and_then(Value::as_bool)
        .unwrap_or(defaults.enabled);
    let interval_minutes = map
        .get("interval_minutes")
        .and_then(interval_minutes)
        .unwrap_or(defaults.interval_minutes);

    Ok(AutoFeedUpdate {
        enabled,
        interval_minutes,
        grams: grams_field(&map, defaults.grams),
    })
}

/// Whole minutes; negatives become 0, fractions are truncated.
fn interval_minutes(v: &Value) -> Option<u64> {
    if let Some(u) = v.as_u64() {
        return Some(u);
    }
    if v.as_i64().is_some() {
        return Some(0);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    v.as_f64()
        .filter(|f| f.is_finite())
        .map(|f| if f <= 0.0 { 0 } else { f as u64 })
}
