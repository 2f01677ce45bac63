//! Process-wide shutdown coordination.
//! Provides a flag set by the ctrlc handler so the watch loop and stability waits can exit early.
//!
//! Notes:
//! - Relaxed atomics are sufficient for a one-way "stop" flag.
//! - `request()` is safe to call from signal handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Longest uninterrupted nap taken by `sleep`.
const SLICE: Duration = Duration::from_millis(100);

/// Request a cooperative shutdown (idempotent).
#[inline]
pub fn request() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Check whether a shutdown has been requested.
#[inline]
pub fn is_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Sleep for `total`, waking early if a shutdown is requested.
/// Returns false when the sleep was cut short. A duration too large to
/// represent as a deadline sleeps until shutdown.
pub fn sleep(total: Duration) -> bool {
    let deadline = Instant::now().checked_add(total);
    loop {
        if is_requested() {
            return false;
        }
        let nap = match deadline {
            Some(d) => match d.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => SLICE.min(left),
                _ => return true,
            },
            None => SLICE,
        };
        std::thread::sleep(nap);
    }
}

/// Clear the shutdown flag between tests.
#[cfg(test)]
#[inline]
pub fn reset() {
    SHUTDOWN.store(false, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::thread;

    #[test]
    #[serial]
    fn sleep_runs_full_duration_when_not_interrupted() {
        reset();
        let started = Instant::now();
        assert!(sleep(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    #[serial]
    fn sleep_returns_early_on_request() {
        reset();
        thread::spawn(|| {
            thread::sleep(Duration::from_millis(20));
            request();
        });
        let started = Instant::now();
        assert!(!sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        reset();
    }

    #[test]
    #[serial]
    fn unrepresentable_duration_sleeps_until_shutdown() {
        reset();
        thread::spawn(|| {
            thread::sleep(Duration::from_millis(20));
            request();
        });
        let started = Instant::now();
        assert!(!sleep(Duration::from_secs(u64::MAX)));
        assert!(started.elapsed() < Duration::from_secs(5));
        reset();
    }
}
