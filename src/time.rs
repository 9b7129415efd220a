//! Wall clock and pacing helpers shared by the workers.

use chrono::Utc;
use std::cmp;
use std::thread;
use std::time::{Duration, Instant};

/// The current time in fractional seconds since the unix epoch.
pub fn now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1_000.0
}

/// How long to pause before the next pass of a paced loop.
///
/// A pass that started at `started` and took longer than `period` is followed
/// by the next pass immediately, signalled by `None`. Otherwise the remainder
/// of the period is returned, never less than `floor`.
pub fn pace(period: Duration, started: Instant, floor: Duration) -> Option<Duration> {
    let elapsed = started.elapsed();
    if elapsed >= period {
        None
    } else {
        Some(cmp::max(period - elapsed, floor))
    }
}

/// Sleep for `total`, waking every `slice` to consult `stopped`.
///
/// Returns false if the sleep was cut short because `stopped` answered true,
/// true if the full duration elapsed.
pub fn sleep_unless<F>(total: Duration, slice: Duration, stopped: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + total;
    loop {
        if stopped() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(cmp::min(deadline - now, slice));
    }
}
