//! Thread per item, serialised by a (possibly cross-process) mutex
//!
//! Live item threads are capped at `threads`; each one blocks on the mutex
//! before it runs its item, so at most one item per mutex name executes at
//! any instant.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::{acquire_permit, join_item_threads, next_with_permit, PendingQueue};
use crate::queue::core::{ItemRun, QueueCore, Strategy};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::item::{ExecutionError, WorkItem};
use crate::queue::named::{LocalSemaphore, Semaphore};
use crate::queue::options::QueueOptions;

pub(crate) struct NamedMutex<T> {
    pending: Arc<PendingQueue<T>>,
    mutex: Arc<dyn Semaphore>,
    slots: Arc<dyn Semaphore>,
    owner: Option<bool>,
}

impl<T: Send + 'static> NamedMutex<T> {
    pub(crate) fn new(options: &QueueOptions<T>) -> QueueResult<Self> {
        let (mutex, owner) = match options.name() {
            Some(name) => {
                let opened = options.primitives().open_mutex(name).map_err(|source| {
                    QueueError::Primitive {
                        name: name.to_string(),
                        source,
                    }
                })?;
                (opened.semaphore, Some(opened.owner))
            }
            None => (Arc::new(LocalSemaphore::new(1)) as Arc<dyn Semaphore>, None),
        };

        Ok(Self {
            pending: Arc::new(PendingQueue::new()),
            mutex,
            slots: Arc::new(LocalSemaphore::new(options.threads())),
            owner,
        })
    }
}

impl<T: Send + 'static> Strategy<T> for NamedMutex<T> {
    fn start(&self, core: &Arc<QueueCore<T>>) -> QueueResult<()> {
        let pending = Arc::clone(&self.pending);
        let mutex = Arc::clone(&self.mutex);
        let slots = Arc::clone(&self.slots);
        core.spawn_dispatcher("dispatcher", 0, move |core| {
            dispatch(core, &pending, &mutex, &slots);
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

    fn primitive_owner(&self) -> Option<bool> {
        self.owner
    }
}

fn dispatch<T: Send + 'static>(
    core: &Arc<QueueCore<T>>,
    pending: &PendingQueue<T>,
    mutex: &Arc<dyn Semaphore>,
    slots: &Arc<dyn Semaphore>,
) {
    let mut handles: Vec<JoinHandle<()>> = Vec::new();
    let mut spawned = 0usize;

    while core.wait_while_paused() {
        let Some((item, slot)) = next_with_permit(core, pending, slots) else {
            break;
        };

        let run = ItemRun::new(core, item);
        let mutex = Arc::clone(mutex);
        handles.retain(|handle| !handle.is_finished());
        let spawn = thread::Builder::new()
            .name(core.thread_name("item", spawned))
            .spawn(move || {
                let _slot = slot;
                match acquire_permit(run.core(), &mutex) {
                    Ok(Some(_held)) => run.run(),
                    // Cancelled while waiting: run() discards the item
                    Ok(None) => run.run(),
                    Err(e) => run.fail(ExecutionError::failed(e)),
                }
            });
        spawned += 1;

        match spawn {
            Ok(handle) => handles.push(handle),
            Err(e) => log::error!("{}: failed to spawn item thread: {}", core.label(), e),
        }
    }

    join_item_threads(core.label(), handles);
}
