//! Concurrency strategies
//!
//! Each strategy drains the pending items of a [`QueueCore`] a different
//! way:
//!
//! | Strategy            | Pending container        | Execution slots                       |
//! |---------------------|--------------------------|---------------------------------------|
//! | `WorkerPool`        | crossbeam channel        | N long-lived workers                  |
//! | `SemaphoreGated`    | mutex + condvar queue    | thread per item, N permits            |
//! | `Monitor`           | mutex + condvar queue    | N long-lived workers                  |
//! | `Pipeline`          | channel -> bounded stage | N processors behind a forwarder       |
//! | `BatchGroup`        | mutex + condvar queue    | N scoped threads per batch            |
//! | `NamedMutex`        | mutex + condvar queue    | thread per item, one mutex holder     |

use crossbeam::channel::{self, Receiver, Sender};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::core::sync::lock_recover;
use crate::queue::core::QueueCore;
use crate::queue::item::{panic_message, ExecutionError, WorkItem};
use crate::queue::named::{Permit, Semaphore};

mod batch;
mod monitor;
mod mutex;
mod pipeline;
mod semaphore;
mod worker_pool;

pub(crate) use batch::BatchGroup;
pub(crate) use monitor::Monitor;
pub(crate) use mutex::NamedMutex;
pub(crate) use pipeline::Pipeline;
pub(crate) use semaphore::SemaphoreGated;
pub(crate) use worker_pool::WorkerPool;

/// Outcome of waiting on a [`PendingQueue`]
pub(crate) enum Next<T> {
    Item(WorkItem<T>),
    /// Completion with nothing left, or cancellation
    Finished,
}

/// FIFO of pending items guarded by one mutex, with a condition variable
/// signalled on every push
pub(crate) struct PendingQueue<T> {
    items: Mutex<VecDeque<WorkItem<T>>>,
    available: Condvar,
}

impl<T: Send + 'static> PendingQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub(crate) fn push(&self, item: WorkItem<T>) {
        lock_recover(self.items.lock()).push_back(item);
        self.available.notify_one();
    }

    pub(crate) fn drain(&self) -> Vec<WorkItem<T>> {
        lock_recover(self.items.lock()).drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        lock_recover(self.items.lock()).len()
    }

    pub(crate) fn wake(&self) {
        let _items = lock_recover(self.items.lock());
        self.available.notify_all();
    }

    /// Wait for the next item
    ///
    /// Blocks in slices of the poll interval so cancellation raised
    /// outside this queue is still observed.
    pub(crate) fn next(&self, core: &QueueCore<T>) -> Next<T> {
        let mut items = lock_recover(self.items.lock());
        loop {
            if core.is_cancelled() {
                return Next::Finished;
            }
            if let Some(item) = items.pop_front() {
                return Next::Item(item);
            }
            if core.is_complete() {
                return Next::Finished;
            }
            items = lock_recover(self.available.wait_timeout(items, core.poll_interval())).0;
        }
    }

    /// Wait until an item is available without taking it
    ///
    /// `false` once the queue is cancelled, or complete with nothing left.
    pub(crate) fn wait_ready(&self, core: &QueueCore<T>) -> bool {
        let mut items = lock_recover(self.items.lock());
        loop {
            if core.is_cancelled() {
                return false;
            }
            if !items.is_empty() {
                return true;
            }
            if core.is_complete() {
                return false;
            }
            items = lock_recover(self.available.wait_timeout(items, core.poll_interval())).0;
        }
    }

    pub(crate) fn try_pop(&self) -> Option<WorkItem<T>> {
        lock_recover(self.items.lock()).pop_front()
    }

    /// Wait until a batch of up to `size` items is ready and take it
    ///
    /// Items stay in the queue (and visible to [`drain`](Self::drain))
    /// until the whole batch is taken at once. A batch is ready when
    /// `size` items are waiting, when the queue is complete, or when
    /// `threshold` has elapsed on the queue clock since the oldest waiting
    /// item was first seen. `None` once finished.
    pub(crate) fn next_batch(
        &self,
        core: &QueueCore<T>,
        size: usize,
        threshold: Option<Duration>,
    ) -> Option<Vec<WorkItem<T>>> {
        let clock = core.options().clock();
        let mut first_seen: Option<Instant> = None;
        let mut items = lock_recover(self.items.lock());
        loop {
            if core.is_cancelled() {
                return None;
            }
            if items.is_empty() {
                if core.is_complete() {
                    return None;
                }
                // Cleared while collecting: the threshold restarts
                first_seen = None;
            } else {
                let seen = *first_seen.get_or_insert_with(|| clock.now());
                let expired = threshold.is_some_and(|threshold| clock.now() >= seen + threshold);
                if items.len() >= size || core.is_complete() || expired {
                    if expired && items.len() < size {
                        log::trace!(
                            "{}: threshold elapsed, flushing {} of {} slot(s)",
                            core.label(),
                            items.len(),
                            size
                        );
                    }
                    let take = items.len().min(size);
                    return Some(items.drain(..take).collect());
                }
            }

            let mut wait_for = core.poll_interval();
            if let (Some(seen), Some(threshold)) = (first_seen, threshold) {
                wait_for = wait_for.min((seen + threshold).saturating_duration_since(clock.now()));
            }
            items = lock_recover(self.available.wait_timeout(items, wait_for)).0;
        }
    }
}

/// Wake-up signal for dispatchers blocked in `crossbeam::select!`
///
/// Firing drops the only sender, which leaves the receiver permanently
/// disconnected and therefore always ready.
pub(crate) struct WakeSignal {
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = channel::bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    pub(crate) fn receiver(&self) -> Receiver<()> {
        self.receiver.clone()
    }

    pub(crate) fn fire(&self) {
        lock_recover(self.sender.lock()).take();
    }
}

/// Acquire a permit, re-checking cancellation every poll interval
///
/// Returns `Ok(None)` once the queue is cancelled.
pub(crate) fn acquire_permit<T: Send + 'static>(
    core: &QueueCore<T>,
    semaphore: &Arc<dyn Semaphore>,
) -> io::Result<Option<Permit>> {
    loop {
        if core.is_cancelled() {
            return Ok(None);
        }
        if let Some(permit) = Permit::acquire(semaphore, core.poll_interval())? {
            return Ok(Some(permit));
        }
    }
}

/// Wait for an item and a permit, then take the item
///
/// The item leaves the pending queue only once the permit is held, so a
/// dispatcher blocked on the semaphore holds nothing `clear()` cannot
/// reach. `None` once the queue is finished or cancelled.
pub(crate) fn next_with_permit<T: Send + 'static>(
    core: &QueueCore<T>,
    pending: &PendingQueue<T>,
    semaphore: &Arc<dyn Semaphore>,
) -> Option<(WorkItem<T>, Permit)> {
    loop {
        if !pending.wait_ready(core) {
            return None;
        }
        match acquire_permit(core, semaphore) {
            Ok(Some(permit)) => match pending.try_pop() {
                Some(item) => return Some((item, permit)),
                // Cleared while waiting; the permit goes back
                None => continue,
            },
            Ok(None) => return None,
            Err(e) => {
                if let Some(item) = pending.try_pop() {
                    core.abandon(item, ExecutionError::failed(e));
                }
            }
        }
    }
}

/// Join item threads, logging any that panicked
pub(crate) fn join_item_threads(label: &str, handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(payload) = handle.join() {
            log::error!(
                "{}: item thread panicked: {}",
                label,
                panic_message(payload.as_ref())
            );
        }
    }
}
