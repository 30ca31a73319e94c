//! Monotonic millisecond clock used to gate liveness checks.
//!
//! The link never reads the wall clock.  It only needs "milliseconds since
//! some fixed point", which must never go backwards, so it can compare the
//! time of the last liveness check with now.
//!
//! [`MonotonicClock`] is backed by `tokio::time::Instant`.  Under
//! `tokio::time::pause()` that instant only moves when the test advances it,
//! which makes the ten-second window testable without sleeping.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::time::Instant;

/// Source of monotonic milliseconds.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send {
    /// Milliseconds elapsed since the clock's own epoch.
    fn now_ms(&self) -> u64;
}

/// Clock whose epoch is the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Hand-driven clock for tests and simulations.
///
/// Clones share the same counter, so a test can keep one handle while the
/// link owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time.
    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::Relaxed);
    }

    /// Moves the current time forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_manual_clock_starts_at_zero() {
        assert_eq!(ManualClock::new().now_ms(), 0);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        // Arrange
        let clock = ManualClock::new();
        let handle = clock.clone();

        // Act
        handle.advance(1_500);
        handle.advance(500);

        // Assert
        assert_eq!(clock.now_ms(), 2_000);
    }

    #[test]
    fn test_manual_clock_set_overrides() {
        let clock = ManualClock::new();
        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_follows_paused_tokio_time() {
        // Arrange
        let clock = MonotonicClock::new();

        // Act
        tokio::time::advance(Duration::from_secs(10)).await;

        // Assert
        assert_eq!(clock.now_ms(), 10_000);
    }

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        tokio_test::block_on(async { tokio::time::sleep(Duration::from_millis(2)).await });
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
