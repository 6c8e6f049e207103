use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `is_high` until the line goes low or `timeout` expires, sleeping
/// `poll_interval` between checks so a missing sensor does not pin a core.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Sign-extend a 24-bit two's complement sample.
#[inline]
pub fn sign_extend_24(value: u32) -> i32 {
    ((value << 8) as i32) >> 8
}
