//! Fixed pool of long-lived workers sharing one FIFO channel

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use std::sync::Arc;

use super::WakeSignal;
use crate::queue::core::{QueueCore, Strategy};
use crate::queue::error::QueueResult;
use crate::queue::item::WorkItem;

pub(crate) struct WorkerPool<T> {
    sender: Sender<WorkItem<T>>,
    receiver: Receiver<WorkItem<T>>,
    wake: Arc<WakeSignal>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            receiver,
            wake: Arc::new(WakeSignal::new()),
        }
    }
}

impl<T: Send + 'static> Strategy<T> for WorkerPool<T> {
    fn start(&self, core: &Arc<QueueCore<T>>) -> QueueResult<()> {
        for index in 0..core.threads() {
            let items = self.receiver.clone();
            let closed = self.wake.receiver();
            core.spawn_dispatcher("worker", index, move |core| {
                work(core, &items, &closed);
            })?;
        }
        Ok(())
    }

    fn push(&self, item: WorkItem<T>) {
        // The pool owns the receiver, so the channel cannot be disconnected
        let _ = self.sender.send(item);
    }

    fn drain(&self) -> Vec<WorkItem<T>> {
        self.receiver.try_iter().collect()
    }

    fn pending(&self) -> usize {
        self.receiver.len()
    }

    fn wake(&self) {
        self.wake.fire();
    }
}

fn work<T: Send + 'static>(
    core: &Arc<QueueCore<T>>,
    items: &Receiver<WorkItem<T>>,
    closed: &Receiver<()>,
) {
    while core.wait_while_paused() {
        if core.is_draining() {
            match items.try_recv() {
                Ok(item) => core.run(item),
                Err(_) => break,
            }
            continue;
        }

        select! {
            recv(items) -> item => {
                if let Ok(item) = item {
                    core.run(item);
                }
            }
            recv(closed) -> _ => {}
            default(core.poll_interval()) => {}
        }
    }
}
