use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use crossbeam_utils::{Backoff, CachePadded};
use tracing::{debug, trace};

use crate::error::QueueError;
use crate::gate::WaitGate;
use crate::registry::{QueueId, Registry};
use crate::sync::{snooze, spin, AtomicU64, AtomicUsize, Ordering, UnsafeCell};
use crate::timeout::Timeout;

/// With a single slot the "claimed" and "free for the next lap" markers
/// coincide, so a capacity-1 queue runs on two slots and caps occupancy in
/// `try_push` instead.
const MIN_SLOTS: usize = 2;

#[repr(C, align(64))]
struct Slot<T> {
    /// Equals the write cursor that may fill this slot when free, and that
    /// value + 1 once filled and not yet claimed.
    ready: AtomicUsize,
    value: UnsafeCell<Option<T>>,
}

impl<T> Slot<T> {
    fn new(seq: usize) -> Self {
        Slot {
            ready: AtomicUsize::new(seq),
            value: UnsafeCell::new(None),
        }
    }
}

/// Creates a queue holding at most `capacity` unread samples.
///
/// Returns the only [`Producer`] the queue will ever have, and a consumer
/// handle that can be cloned freely across threads.
///
/// # Panics
///
/// Panics if `capacity` is zero or too large to index.
pub fn bounded<T>(capacity: usize) -> (Producer<T>, Arc<ConsumerQueue<T>>) {
    match try_bounded(capacity) {
        Ok(pair) => pair,
        Err(err) => panic!("{err}"),
    }
}

/// Fallible form of [`bounded`].
pub fn try_bounded<T>(
    capacity: usize,
) -> Result<(Producer<T>, Arc<ConsumerQueue<T>>), QueueError> {
    let queue = Arc::new(ConsumerQueue::build(capacity, None)?);
    Ok((
        Producer {
            queue: queue.clone(),
        },
        queue,
    ))
}

/// Bounded single-producer, multi-consumer queue that drops the oldest
/// sample when full.
///
/// Cursors and slot markers live in the index space `0..2 * slots`, which is
/// what lets a single marker per slot tell a free slot from a filled one.
///
/// Any number of threads may pop through shared handles. Pushing goes through
/// the queue's single [`Producer`] (or, for a registered queue, the
/// registry's [`WeakProducer`]), so there is never more than one writer.
pub struct ConsumerQueue<T> {
    slots: Box<[Slot<T>]>,
    capacity: usize,
    wrap_at: usize,
    write: CachePadded<AtomicUsize>,
    read: CachePadded<AtomicUsize>,
    evicted: CachePadded<AtomicU64>,
    gate: WaitGate,
    id: QueueId,
    registry: Option<Arc<dyn Registry<T>>>,
}

impl<T> ConsumerQueue<T> {
    /// Creates a queue and registers it with `registry` as a reader.
    ///
    /// The registry receives the queue's producer as a [`WeakProducer`]; the
    /// queue unregisters itself when the last consumer handle is dropped.
    pub fn with_registry(
        capacity: usize,
        registry: Arc<dyn Registry<T>>,
    ) -> Result<Arc<Self>, QueueError> {
        let queue = Arc::new(Self::build(capacity, Some(registry.clone()))?);
        registry.register(
            queue.id,
            WeakProducer {
                queue: Arc::downgrade(&queue),
            },
        );
        debug!(queue = %queue.id, capacity, "registered consumer queue");
        Ok(queue)
    }

    fn build(
        capacity: usize,
        registry: Option<Arc<dyn Registry<T>>>,
    ) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        let slot_count = capacity.max(MIN_SLOTS);
        // add_wrap may briefly hold up to 3 * slot_count
        if slot_count > usize::MAX / 4 {
            return Err(QueueError::CapacityTooLarge(capacity));
        }

        Ok(ConsumerQueue {
            slots: (0..slot_count).map(Slot::new).collect(),
            capacity,
            wrap_at: slot_count * 2,
            write: CachePadded::new(AtomicUsize::new(0)),
            read: CachePadded::new(AtomicUsize::new(0)),
            evicted: CachePadded::new(AtomicU64::new(0)),
            gate: WaitGate::new(),
            id: QueueId::next(),
            registry,
        })
    }

    /// Pushes a sample, dropping the oldest unread one if the queue is full,
    /// then wakes one blocked consumer.
    ///
    /// # Safety
    ///
    /// No other push to this queue may run concurrently. [`Producer`] and
    /// [`WeakProducer`] guarantee this through `&mut self`.
    pub(crate) unsafe fn push_unchecked(&self, mut sample: T) {
        let backoff = Backoff::new();
        while let Err(rejected) = self.try_push(sample) {
            sample = rejected;
            if self.claim().is_some() {
                let evicted = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(queue = %self.id, evicted, "queue full, dropped oldest sample");
            } else {
                // a consumer emptied the queue or is still releasing our slot
                snooze(&backoff);
            }
        }
        self.gate.notify_one();
    }

    /// Pops the oldest unread sample, blocking on an empty queue for at most
    /// `timeout`. Returns `None` once the timeout expires.
    pub fn pop(&self, timeout: Timeout) -> Option<T> {
        if let Some(sample) = self.claim() {
            return Some(sample);
        }
        if !timeout.is_blocking() {
            return None;
        }
        let deadline = timeout.deadline(Instant::now());
        self.gate.wait_for(deadline, || self.claim())
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<T> {
        self.claim()
    }

    /// Number of unread samples. Only exact when called from the sole consumer.
    pub fn available_count(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        self.distance(write, read).min(self.capacity)
    }

    /// Same caveat as [`available_count`](Self::available_count).
    pub fn is_empty(&self) -> bool {
        self.read.load(Ordering::Acquire) == self.write.load(Ordering::Acquire)
    }

    /// Drops every unread sample and returns how many were dropped.
    pub fn flush(&self) -> usize {
        let mut dropped = 0;
        while self.claim().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(queue = %self.id, dropped, "flushed consumer queue");
        }
        dropped
    }

    /// Maximum number of unread samples the queue holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Identity used in registry bookkeeping and log fields.
    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Samples the producer has dropped to make room since construction.
    pub fn evicted_count(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Only the single producer may call this.
    fn try_push(&self, sample: T) -> Result<(), T> {
        let write = self.write.load(Ordering::Acquire);
        let next = self.add_wrap(write, 1);
        let slot = &self.slots[write % self.slots.len()];
        if slot.ready.load(Ordering::Acquire) != write {
            return Err(sample);
        }
        if self.capacity < self.slots.len()
            && self.distance(write, self.read.load(Ordering::Acquire)) >= self.capacity
        {
            return Err(sample);
        }
        self.write.store(next, Ordering::Release);
        // SAFETY: the marker equals the write cursor, so no consumer owns this
        // slot, and only the single producer writes to it.
        slot.value.with_mut(|value| unsafe { *value = Some(sample) });
        slot.ready.store(next, Ordering::Release);
        Ok(())
    }

    fn claim(&self) -> Option<T> {
        let mut read = self.read.load(Ordering::Relaxed);
        let slot = loop {
            let slot = &self.slots[read % self.slots.len()];
            let ready = slot.ready.load(Ordering::Acquire);
            let next = self.add_wrap(read, 1);
            if ready == next {
                match self.read.compare_exchange_weak(
                    read,
                    next,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break slot,
                    Err(current) => read = current,
                }
            } else if ready == read {
                return None;
            } else {
                // behind or racing another consumer
                spin();
                read = self.read.load(Ordering::Relaxed);
            }
        };
        // SAFETY: winning the CAS hands this slot to us alone until the
        // marker store below releases it back to the producer.
        let sample = slot.value.with_mut(|value| unsafe { (*value).take() });
        slot.ready
            .store(self.add_wrap(read, self.slots.len()), Ordering::Release);
        sample
    }

    #[inline(always)]
    fn add_wrap(&self, index: usize, delta: usize) -> usize {
        let sum = index + delta;
        if sum >= self.wrap_at {
            sum - self.wrap_at
        } else {
            sum
        }
    }

    #[inline(always)]
    fn distance(&self, write: usize, read: usize) -> usize {
        if write >= read {
            write - read
        } else {
            write + self.wrap_at - read
        }
    }
}

impl<T> Drop for ConsumerQueue<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.take() {
            registry.unregister(self.id);
            debug!(queue = %self.id, "unregistered consumer queue");
        }
    }
}

impl<T> fmt::Debug for ConsumerQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerQueue")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("available", &self.available_count())
            .field("evicted", &self.evicted_count())
            .field("registered", &self.registry.is_some())
            .finish()
    }
}

unsafe impl<T: Send> Send for ConsumerQueue<T> {}
unsafe impl<T: Send> Sync for ConsumerQueue<T> {}

/// Write side of a queue. There is exactly one per queue and it cannot be
/// cloned, so pushes never race each other. It can be moved to another thread.
///
/// A second producer cannot be conjured from shared handles:
///
/// ```compile_fail
/// let (producer, queue) = consumer_queue::bounded::<u32>(4);
/// let second = producer.clone();
/// ```
///
/// ```compile_fail
/// let (producer, _queue) = consumer_queue::bounded::<u32>(4);
/// let shared = std::sync::Arc::new(producer);
/// shared.push(1);
/// ```
pub struct Producer<T> {
    queue: Arc<ConsumerQueue<T>>,
}

impl<T> Producer<T> {
    /// Pushes a sample, dropping the oldest unread one if the queue is full,
    /// then wakes one blocked consumer.
    pub fn push(&mut self, sample: T) {
        // SAFETY: `&mut self` on the queue's only producer.
        unsafe { self.queue.push_unchecked(sample) }
    }

    /// The queue this producer writes to.
    pub fn queue(&self) -> &Arc<ConsumerQueue<T>> {
        &self.queue
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("queue", &self.queue.id)
            .finish()
    }
}

/// Producer of a registered queue, held by its [`Registry`].
///
/// It does not keep the queue alive: once every consumer handle is gone,
/// pushes hand the sample back.
pub struct WeakProducer<T> {
    queue: Weak<ConsumerQueue<T>>,
}

impl<T> WeakProducer<T> {
    /// Pushes into the queue if it is still alive, otherwise returns the
    /// sample.
    pub fn push(&mut self, sample: T) -> Result<(), T> {
        match self.upgrade() {
            // SAFETY: `&mut self` on the queue's only producer.
            Some(queue) => unsafe {
                queue.push_unchecked(sample);
                Ok(())
            },
            None => Err(sample),
        }
    }

    /// Whether any consumer handle to the queue remains.
    pub fn is_alive(&self) -> bool {
        self.queue.strong_count() > 0
    }

    /// Callers may push through the returned handle only while they hold
    /// `&mut self`.
    pub(crate) fn upgrade(&mut self) -> Option<Arc<ConsumerQueue<T>>> {
        self.queue.upgrade()
    }
}

impl<T> fmt::Debug for WeakProducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakProducer")
            .field("alive", &self.is_alive())
            .finish()
    }
}
