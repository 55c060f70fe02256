#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
#[cfg(not(loom))]
pub(crate) use std::sync::{Condvar, Mutex};

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
#[cfg(loom)]
pub(crate) use loom::sync::{Condvar, Mutex};

#[cfg(loom)]
pub(crate) use loom::cell::UnsafeCell;

/// `std` cell with the closure-based access API of `loom::cell::UnsafeCell`.
#[cfg(not(loom))]
#[derive(Debug)]
pub(crate) struct UnsafeCell<T>(std::cell::UnsafeCell<T>);

#[cfg(not(loom))]
impl<T> UnsafeCell<T> {
    pub(crate) const fn new(value: T) -> Self {
        UnsafeCell(std::cell::UnsafeCell::new(value))
    }

    #[inline(always)]
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        f(self.0.get())
    }
}

/// One step of the producer's retry loop while a consumer finishes releasing a slot.
#[cfg(not(loom))]
#[inline]
pub(crate) fn snooze(backoff: &crossbeam_utils::Backoff) {
    backoff.snooze();
}

#[cfg(loom)]
#[inline]
pub(crate) fn snooze(_backoff: &crossbeam_utils::Backoff) {
    loom::thread::yield_now();
}

/// Retry step for a consumer that found another consumer mid-claim on its slot.
#[cfg(not(loom))]
#[inline(always)]
pub(crate) fn spin() {
    core::hint::spin_loop();
}

#[cfg(loom)]
#[inline]
pub(crate) fn spin() {
    loom::thread::yield_now();
}
