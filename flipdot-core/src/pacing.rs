//! Write pacing
//!
//! The dot controller cannot accept updates faster than a fixed rate
//! (roughly 4700 flips per second). The renderer calls [`Pacer::pace`] after
//! every flip it writes, or would write if output is disabled; pixels without
//! a pending flip never reach the pacer.

use std::thread;
use std::time::Duration;

/// Default minimum interval between two device writes
pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_micros(215);

/// Rate limiter applied after each device write
pub trait Pacer {
    /// Called once after every emitted write
    ///
    /// Blocks until the next write may be issued.
    fn pace(&mut self);
}

/// Fixed minimum interval after each write
///
/// Sleeps for the whole interval once a write has been issued, bounding the
/// write rate at `1 / interval` regardless of how fast the scan runs.
#[derive(Debug, Clone)]
pub struct IntervalPacer {
    interval: Duration,
}

impl IntervalPacer {
    /// Create a pacer with the given minimum interval
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Minimum interval between writes
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum number of writes per second this pacer allows
    pub fn max_rate(&self) -> Option<u64> {
        let nanos = self.interval.as_nanos();
        if nanos == 0 {
            return None;
        }
        u64::try_from(1_000_000_000 / nanos).ok()
    }
}

impl Default for IntervalPacer {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_INTERVAL)
    }
}

impl Pacer for IntervalPacer {
    fn pace(&mut self) {
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
    }
}

/// Pacer that never waits
///
/// For devices without a rate limit and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn pace(&mut self) {}
}

impl<P: Pacer + ?Sized> Pacer for &mut P {
    fn pace(&mut self) {
        (**self).pace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_default_interval() {
        let pacer = IntervalPacer::default();
        assert_eq!(pacer.interval(), Duration::from_micros(215));
        assert_eq!(pacer.max_rate(), Some(4651));
    }

    #[test]
    fn test_zero_interval_has_no_rate_limit() {
        let pacer = IntervalPacer::new(Duration::ZERO);
        assert_eq!(pacer.max_rate(), None);
    }

    #[test]
    fn test_zero_interval_does_not_sleep() {
        let mut pacer = IntervalPacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..1000 {
            pacer.pace();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_pace_enforces_interval() {
        let mut pacer = IntervalPacer::new(Duration::from_millis(2));
        let start = Instant::now();
        for _ in 0..5 {
            pacer.pace();
        }
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
