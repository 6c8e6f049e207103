use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use feeder_hardware::error::HwError;
use feeder_hardware::util::wait_until_low_with_timeout;

#[test]
fn returns_once_line_drops() {
    let high = Arc::new(AtomicBool::new(true));
    let high_bg = high.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        high_bg.store(false, Ordering::Relaxed);
    });

    let res = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(200),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected data-ready, got {res:?}");
}

#[test]
fn already_low_line_does_not_sleep() {
    let polls = AtomicUsize::new(0);
    let started = Instant::now();
    wait_until_low_with_timeout(
        || {
            polls.fetch_add(1, Ordering::Relaxed);
            false
        },
        Duration::from_millis(5),
        Duration::from_secs(1),
    )
    .expect("line already low");
    assert_eq!(polls.load(Ordering::Relaxed), 1);
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[test]
fn stuck_high_line_times_out() {
    let err = wait_until_low_with_timeout(
        || true,
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected data-ready timeout");

    match err {
        HwError::DataReadyTimeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}
