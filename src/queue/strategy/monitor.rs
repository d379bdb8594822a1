//! Mutex + condition variable queue with a fixed set of workers
//!
//! Producers push under the queue lock and signal one waiter; workers
//! sleep on the condition in poll-interval slices while the queue is
//! empty.

use std::sync::Arc;

use super::{Next, PendingQueue};
use crate::queue::core::{QueueCore, Strategy};
use crate::queue::error::QueueResult;
use crate::queue::item::WorkItem;

pub(crate) struct Monitor<T> {
    pending: Arc<PendingQueue<T>>,
}

impl<T: Send + 'static> Monitor<T> {
    pub(crate) fn new() -> Self {
        Self {
            pending: Arc::new(PendingQueue::new()),
        }
    }
}

impl<T: Send + 'static> Strategy<T> for Monitor<T> {
    fn start(&self, core: &Arc<QueueCore<T>>) -> QueueResult<()> {
        for index in 0..core.threads() {
            let pending = Arc::clone(&self.pending);
            core.spawn_dispatcher("monitor", index, move |core| {
                while core.wait_while_paused() {
                    match pending.next(core) {
                        Next::Item(item) => core.run(item),
                        Next::Finished => break,
                    }
                }
            })?;
        }
        Ok(())
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
