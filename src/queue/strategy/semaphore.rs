//! Single dispatcher handing each item to its own thread
//!
//! The dispatcher takes a permit before spawning, so at most `threads`
//! item threads run at once. Naming the queue opens a named semaphore
//! through the configured provider, which lets several queues (or
//! processes) share the same permit budget.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::{join_item_threads, next_with_permit, PendingQueue};
use crate::queue::core::{ItemRun, QueueCore, Strategy};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::item::WorkItem;
use crate::queue::named::{LocalSemaphore, Semaphore};
use crate::queue::options::QueueOptions;

pub(crate) struct SemaphoreGated<T> {
    pending: Arc<PendingQueue<T>>,
    semaphore: Arc<dyn Semaphore>,
    owner: Option<bool>,
}

impl<T: Send + 'static> SemaphoreGated<T> {
    pub(crate) fn new(options: &QueueOptions<T>) -> QueueResult<Self> {
        let (semaphore, owner) = match options.name() {
            Some(name) => {
                let opened = options
                    .primitives()
                    .open_semaphore(name, options.threads())
                    .map_err(|source| QueueError::Primitive {
                        name: name.to_string(),
                        source,
                    })?;
                (opened.semaphore, Some(opened.owner))
            }
            None => (
                Arc::new(LocalSemaphore::new(options.threads())) as Arc<dyn Semaphore>,
                None,
            ),
        };

        Ok(Self {
            pending: Arc::new(PendingQueue::new()),
            semaphore,
            owner,
        })
    }
}

impl<T: Send + 'static> Strategy<T> for SemaphoreGated<T> {
    fn start(&self, core: &Arc<QueueCore<T>>) -> QueueResult<()> {
        let pending = Arc::clone(&self.pending);
        let semaphore = Arc::clone(&self.semaphore);
        core.spawn_dispatcher("dispatcher", 0, move |core| {
            dispatch(core, &pending, &semaphore);
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
    semaphore: &Arc<dyn Semaphore>,
) {
    let mut handles: Vec<JoinHandle<()>> = Vec::new();
    let mut spawned = 0usize;

    while core.wait_while_paused() {
        let Some((item, permit)) = next_with_permit(core, pending, semaphore) else {
            break;
        };

        let run = ItemRun::new(core, item);
        handles.retain(|handle| !handle.is_finished());
        let spawn = thread::Builder::new()
            .name(core.thread_name("item", spawned))
            .spawn(move || {
                let _permit = permit;
                run.run();
            });
        spawned += 1;

        match spawn {
            Ok(handle) => handles.push(handle),
            Err(e) => log::error!("{}: failed to spawn item thread: {}", core.label(), e),
        }
    }

    join_item_threads(core.label(), handles);
}
