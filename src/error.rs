//! Errors reported when building a queue.

use thiserror::Error;

/// Why a queue could not be created.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// A queue must hold at least one sample.
    #[error("capacity must be greater than 0")]
    ZeroCapacity,

    /// The slot count would overflow the cursor arithmetic.
    #[error("capacity {0} is too large for the queue index space")]
    CapacityTooLarge(usize),
}
