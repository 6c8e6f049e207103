use std::thread;
use std::time::{Duration, Instant};

/// Time source for the tick loop, the watchdog and the auto-feed scheduler.
///
/// All deadlines in the feeder are wall-clock relative and evaluated once per
/// tick, so the only thing the core needs is "now" plus a way to wait out the
/// remainder of a tick.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Time elapsed since `since`; zero if `since` lies in the future.
    fn elapsed(&self, since: Instant) -> Duration {
        self.now().saturating_duration_since(since)
    }

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        u64::try_from(self.elapsed(epoch).as_millis()).unwrap_or(u64::MAX)
    }
}

/// Real clock backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Clock that only moves when told to.
    ///
    /// `now()` is `origin + offset`; `sleep(d)` advances the offset instead of
    /// blocking, so a tick loop driven by this clock runs as fast as the test
    /// can spin it. Clones share the same offset.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        pub fn set_offset(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = d;
            }
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
            self.origin + off
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_clock::TestClock;
    use super::*;

    #[test]
    fn test_clock_advances_only_when_told() {
        let clock = TestClock::new();
        let t0 = clock.now();
        assert_eq!(clock.ms_since(t0), 0);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.ms_since(t0), 250);
        clock.sleep(Duration::from_secs(1));
        assert_eq!(clock.ms_since(t0), 1_250);
    }

    #[test]
    fn clones_share_time() {
        let a = TestClock::new();
        let b = a.clone();
        let t0 = a.now();
        b.advance(Duration::from_secs(2));
        assert_eq!(a.elapsed(t0), Duration::from_secs(2));
    }

    #[test]
    fn set_offset_is_absolute() {
        let clock = TestClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(5));
        clock.set_offset(Duration::from_secs(2));
        assert_eq!(clock.ms_since(t0), 2_000);
    }

    #[test]
    fn elapsed_saturates_for_future_instant() {
        let clock = TestClock::new();
        let future = clock.now() + Duration::from_secs(3);
        assert_eq!(clock.elapsed(future), Duration::ZERO);
        assert_eq!(clock.ms_since(future), 0);
    }
}
