//! Wall-clock timing, used only for the end-of-run performance summary.

use std::time::Instant;

/// A monotonic wall-clock sample, analogous to `midas_time_t`.
///
/// Wraps [`Instant`] rather than a raw microsecond counter; `Instant` is
/// already monotonic and immune to clock adjustments, which is all the
/// performance summary needs.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp(Instant);

impl Timestamp {
    /// Samples the current time.
    #[must_use]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Seconds elapsed between `start` and `self`.
    #[must_use]
    pub fn diff_secs(self, start: Self) -> f64 {
        self.0.saturating_duration_since(start.0).as_secs_f64()
    }
}
