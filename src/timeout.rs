//! Pop timeouts.

use std::time::{Duration, Instant};

/// Timeouts at or above this many seconds block indefinitely.
pub const FOREVER_SECS: f64 = 32_000_000.0;

/// How long [`ConsumerQueue::pop`](crate::ConsumerQueue::pop) may block on an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Return immediately if nothing is available.
    NonBlocking,
    /// Block for at most this long.
    After(Duration),
    /// Block until a sample arrives.
    #[default]
    Forever,
}

impl Timeout {
    /// Converts a timeout in seconds.
    ///
    /// Non-positive values (and NaN) never block; values of at least
    /// [`FOREVER_SECS`] block indefinitely.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs <= 0.0 {
            Timeout::NonBlocking
        } else if secs >= FOREVER_SECS {
            Timeout::Forever
        } else {
            Duration::try_from_secs_f64(secs).map_or(Timeout::Forever, Timeout::After)
        }
    }

    /// Whether a pop with this timeout may wait at all.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Timeout::NonBlocking)
    }

    /// Absolute deadline measured from `now`; `None` means no deadline.
    pub(crate) fn deadline(&self, now: Instant) -> Option<Instant> {
        match self {
            Timeout::After(d) => now.checked_add(*d),
            Timeout::NonBlocking => Some(now),
            Timeout::Forever => None,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Timeout::NonBlocking
        } else {
            Timeout::After(d)
        }
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(d: Option<Duration>) -> Self {
        d.map_or(Timeout::Forever, Timeout::from)
    }
}
