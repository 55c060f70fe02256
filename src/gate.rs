//! Slow-path wake/wait pair for consumers that find the queue empty.

use std::sync::PoisonError;
use std::time::Instant;

use crate::sync::{Condvar, Mutex};

pub(crate) struct WaitGate {
    lock: Mutex<()>,
    ready: Condvar,
}

impl WaitGate {
    pub(crate) fn new() -> Self {
        WaitGate {
            lock: Mutex::new(()),
            ready: Condvar::new(),
        }
    }

    /// Wakes one waiter. Notifying under the lock keeps a consumer from
    /// re-checking, finding nothing, and only then starting to wait.
    pub(crate) fn notify_one(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ready.notify_one();
    }

    /// Repeats `attempt` under the lock until it yields a value or `deadline`
    /// passes. `None` as deadline waits without bound.
    pub(crate) fn wait_for<R>(
        &self,
        deadline: Option<Instant>,
        mut attempt: impl FnMut() -> Option<R>,
    ) -> Option<R> {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = attempt() {
                return Some(value);
            }
            match deadline {
                None => {
                    guard = self
                        .ready
                        .wait(guard)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    guard = self
                        .ready
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}
