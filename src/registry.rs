//! Reader registration for queues that share one logical stream.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::error::QueueError;
use crate::queue::{ConsumerQueue, WeakProducer};

/// Process-unique identity of a [`ConsumerQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(u64);

impl QueueId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        QueueId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier, unique within the process.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bookkeeping for the readers of one stream.
///
/// A queue built with [`ConsumerQueue::with_registry`] calls `register` once
/// it is constructed and `unregister` from its destructor. `unregister` may
/// therefore run on whichever thread drops the last handle to the queue, and
/// must not be called while the registry holds a lock that dropping a queue
/// would need.
pub trait Registry<T>: Send + Sync {
    /// Takes ownership of the new queue's only producer.
    fn register(&self, id: QueueId, producer: WeakProducer<T>);

    /// Forgets the queue; its producer can no longer deliver anything.
    fn unregister(&self, id: QueueId);
}

/// Registry that copies every sample into each live reader queue.
///
/// The reader list and every push happen under one lock, so
/// [`push_sample`](Self::push_sample) may be called from several threads.
pub struct FanOut<T> {
    readers: Mutex<Vec<(QueueId, WeakProducer<T>)>>,
}

impl<T: Send + 'static> FanOut<T> {
    /// Creates a fan-out with no readers.
    pub fn new() -> Arc<Self> {
        Arc::new(FanOut {
            readers: Mutex::new(Vec::new()),
        })
    }

    /// Creates a reader queue registered with this fan-out.
    pub fn new_reader(
        self: &Arc<Self>,
        capacity: usize,
    ) -> Result<Arc<ConsumerQueue<T>>, QueueError> {
        ConsumerQueue::with_registry(capacity, self.clone())
    }
}

impl<T> FanOut<T> {
    /// Pushes a copy of `sample` into every live reader.
    pub fn push_sample(&self, sample: T)
    where
        T: Clone,
    {
        let mut readers = self.lock();
        // Every reader is upgraded before any clone runs, and `live` outlives
        // the guard: a reader whose last handle ends up here is dropped, and
        // unregisters, only after the lock is released.
        let live: Vec<Arc<ConsumerQueue<T>>> = readers
            .iter_mut()
            .filter_map(|(_, producer)| producer.upgrade())
            .collect();

        if let Some((last, rest)) = live.split_last() {
            // SAFETY: each queue's only producer sits in `readers`, and the
            // lock is held for every push.
            unsafe {
                for reader in rest {
                    reader.push_unchecked(sample.clone());
                }
                last.push_unchecked(sample);
            }
        }
        drop(readers);
        drop(live);
    }

    /// Number of registered readers that are still alive.
    pub fn reader_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|(_, producer)| producer.is_alive())
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(QueueId, WeakProducer<T>)>> {
        self.readers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send> Registry<T> for FanOut<T> {
    fn register(&self, id: QueueId, producer: WeakProducer<T>) {
        let mut readers = self.lock();
        readers.push((id, producer));
        trace!(queue = %id, readers = readers.len(), "fan-out reader added");
    }

    fn unregister(&self, id: QueueId) {
        let mut readers = self.lock();
        readers.retain(|(reader, _)| *reader != id);
        trace!(queue = %id, readers = readers.len(), "fan-out reader removed");
    }
}

impl<T> fmt::Debug for FanOut<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<QueueId> = self.lock().iter().map(|(id, _)| *id).collect();
        f.debug_struct("FanOut").field("readers", &ids).finish()
    }
}
