//! Small numeric and time helpers shared by the command parser and scheduler.
use std::time::Duration;

/// Milliseconds in one minute.
pub const MILLIS_PER_MINUTE: u64 = 60_000;

/// Convert a minute count to a `Duration`, saturating instead of overflowing.
#[inline]
pub fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_millis(minutes.saturating_mul(MILLIS_PER_MINUTE))
}

/// Clamp a gram amount to a usable value: non-finite or negative becomes 0.
#[inline]
pub fn clamp_grams(g: f32) -> f32 {
    if g.is_finite() { g.max(0.0) } else { 0.0 }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
#[inline]
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
