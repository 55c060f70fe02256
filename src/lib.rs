//! consumer_queue - bounded single-producer, multi-consumer sample buffer
//!
//! A ring buffer of unread samples sitting between one producer thread and
//! any number of consumer threads. When it is full the producer drops the
//! oldest unread sample instead of blocking or growing, so memory stays
//! bounded and the producer never waits on slow readers.
//!
//! Each queue has exactly one [`Producer`]. It cannot be cloned, so pushes
//! never race; consumers share the queue through `Arc` and pop concurrently.
//!
//! Push and pop are lock-free. Only a consumer that finds the queue empty and
//! asks to block touches a mutex/condition-variable pair.
//!
//! ```rust
//! use consumer_queue::Timeout;
//! use std::time::Duration;
//!
//! let (mut producer, queue) = consumer_queue::bounded(3);
//! for sample in ["a", "b", "c", "d"] {
//!     producer.push(sample);
//! }
//! // "a" was dropped to make room for "d"
//! assert_eq!(queue.pop(Timeout::Forever), Some("b"));
//! assert_eq!(queue.flush(), 2);
//! assert_eq!(queue.pop(Duration::from_millis(10).into()), None);
//! ```
//!
//! Several queues can read one stream through a [`FanOut`] registry:
//!
//! ```rust
//! use consumer_queue::FanOut;
//! use std::sync::Arc;
//!
//! let stream = FanOut::new();
//! let fast = stream.new_reader(1024)?;
//! let slow = stream.new_reader(16)?;
//! stream.push_sample(Arc::new(vec![0.5f32; 8]));
//! assert_eq!(fast.available_count(), 1);
//! assert_eq!(slow.available_count(), 1);
//! # Ok::<(), consumer_queue::QueueError>(())
//! ```
#![warn(missing_docs)]

pub use error::QueueError;
pub use queue::{bounded, try_bounded, ConsumerQueue, Producer, WeakProducer};
pub use registry::{FanOut, QueueId, Registry};
pub use timeout::{Timeout, FOREVER_SECS};

pub mod error;
pub(crate) mod gate;
pub(crate) mod queue;
pub mod registry;
pub(crate) mod sync;
pub mod timeout;
