//! Single-fire completion barrier
//!
//! Counts running dispatchers with an "N+1" countdown: the count starts
//! at one, every dispatcher adds itself before it is spawned and removes
//! itself when it exits. A count back at one means nothing is in flight.
//! The barrier can be released exactly once.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug)]
pub(crate) struct CompletionBarrier {
    count: AtomicUsize,
    released: AtomicBool,
}

impl CompletionBarrier {
    pub(crate) fn new() -> Self {
        Self {
            count: AtomicUsize::new(1),
            released: AtomicBool::new(false),
        }
    }

    pub(crate) fn enter(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Remove one dispatcher; returns how many are still in flight
    pub(crate) fn leave(&self) -> usize {
        let previous = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > 1).then(|| n - 1)
            })
            .unwrap_or(1);
        previous.saturating_sub(2)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.count.load(Ordering::SeqCst) - 1
    }

    /// Claim the single release; `true` for exactly one caller
    pub(crate) fn try_release(&self) -> bool {
        self.released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}
