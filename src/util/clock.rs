//! Monotonic time source for operation timing.

use std::time::Instant;

/// Monotonic clock with microsecond-resolution readings.
///
/// Backed by [`Instant`], so readings never go backwards and are not
/// affected by wall-clock adjustments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock;

impl Clock {
    /// Current instant.
    #[inline]
    pub fn now() -> Instant {
        Instant::now()
    }

    /// Microseconds elapsed since `start`, keeping sub-microsecond precision.
    #[inline]
    pub fn elapsed_micros(start: Instant) -> f64 {
        start.elapsed().as_secs_f64() * 1_000_000.0
    }
}
