//! Batch groups: collect up to `threads` items, run them together, wait
//!
//! A batch launches once `threads` items are waiting, or when the queue is
//! complete and fewer remain. With a threshold, a partial batch also
//! launches once the threshold has elapsed since its first item was seen.
//! Items stay in the pending queue until their batch launches, so `clear()`
//! reaches every item that has not started. No item of the next batch
//! starts before every item of the current batch has finished.

use std::sync::Arc;
use std::time::Duration;

use super::PendingQueue;
use crate::queue::core::{ItemRun, QueueCore, Strategy};
use crate::queue::error::QueueResult;
use crate::queue::item::{panic_message, WorkItem};

pub(crate) struct BatchGroup<T> {
    pending: Arc<PendingQueue<T>>,
    threshold: Option<Duration>,
}

impl<T: Send + 'static> BatchGroup<T> {
    pub(crate) fn new(threshold: Option<Duration>) -> Self {
        Self {
            pending: Arc::new(PendingQueue::new()),
            threshold,
        }
    }
}

impl<T: Send + 'static> Strategy<T> for BatchGroup<T> {
    fn start(&self, core: &Arc<QueueCore<T>>) -> QueueResult<()> {
        let pending = Arc::clone(&self.pending);
        let threshold = self.threshold;
        core.spawn_dispatcher("batch", 0, move |core| {
            while core.wait_while_paused() {
                let Some(batch) = pending.next_batch(core, core.threads(), threshold) else {
                    break;
                };
                launch(core, batch);
            }
        })
    }

    fn push(&self, item: WorkItem<T>) {
        self.pending.push(item);
    }

    fn drain(&self) -> Vec<WorkItem<T>> {
        self.pending.drain()
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    fn wake(&self) {
        self.pending.wake();
    }
}

/// Run every item of `batch` on its own scoped thread and wait for all
fn launch<T: Send + 'static>(core: &Arc<QueueCore<T>>, batch: Vec<WorkItem<T>>) {
    log::trace!("{}: launching batch of {}", core.label(), batch.len());

    let outcome = crossbeam::thread::scope(|scope| {
        for (index, item) in batch.into_iter().enumerate() {
            let run = ItemRun::new(core, item);
            let spawned = scope
                .builder()
                .name(core.thread_name("slot", index))
                .spawn(move |_| run.run());
            if let Err(e) = spawned {
                log::error!("{}: failed to spawn batch slot: {}", core.label(), e);
            }
        }
    });

    if let Err(payload) = outcome {
        log::error!(
            "{}: batch slot panicked: {}",
            core.label(),
            panic_message(payload.as_ref())
        );
    }
}
