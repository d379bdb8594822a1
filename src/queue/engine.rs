//! Public queue handle

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::core::cancel::CancellationToken;
use crate::queue::core::QueueCore;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::events::{QueueEvent, QueueEventKind};
use crate::queue::factory::{self, QueueMode};
use crate::queue::item::WorkItem;
use crate::queue::options::QueueOptions;

/// A producer-consumer work queue
///
/// Dropping the queue disposes it: depending on
/// [`QueueOptions::wait_on_dispose`] it either drains the accepted items or
/// stops forcibly.
pub struct ProducerConsumerQueue<T: Send + 'static> {
    core: Arc<QueueCore<T>>,
}

impl<T: Send + 'static> ProducerConsumerQueue<T> {
    /// Create a queue running the `mode` strategy
    ///
    /// Fails when `token` is already cancelled or a named primitive cannot
    /// be opened. Dispatcher threads start on the first enqueue.
    pub fn new(mode: QueueMode, options: QueueOptions<T>, token: &CancellationToken) -> QueueResult<Self> {
        Ok(Self {
            core: factory::build(mode, options, token)?,
        })
    }

    /// Submit a work item
    pub fn enqueue(&self, item: impl Into<WorkItem<T>>) -> QueueResult<()> {
        self.core.enqueue(item.into())
    }

    /// Stop accepting items; accepted items keep draining
    pub fn complete(&self) -> QueueResult<()> {
        self.ensure_live()?;
        self.core.mark_complete();
        Ok(())
    }

    /// Complete, then cancel and clear the pending items
    ///
    /// With `enforce` false, blocks until every accepted item has been
    /// processed first. Returns whether the queue drained; always `true`
    /// when enforced, `false` on a disposed queue.
    pub fn stop(&self, enforce: bool) -> bool {
        if self.core.is_disposed() {
            return false;
        }
        self.core.halt(enforce)
    }

    pub async fn stop_async(&self, enforce: bool) -> bool {
        if self.core.is_disposed() {
            return false;
        }
        self.core.halt_async(enforce).await
    }

    /// Block until the queue is idle
    ///
    /// Returns `false` when `timeout` elapses, cancellation is observed, or
    /// the queue has been disposed.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        if self.core.is_disposed() {
            return false;
        }
        self.core.wait_idle(timeout)
    }

    pub async fn wait_async(&self, timeout: Option<Duration>) -> bool {
        if self.core.is_disposed() {
            return false;
        }
        self.core.wait_idle_async(timeout).await
    }

    /// Drop every item not yet started; returns how many were dropped
    pub fn clear(&self) -> QueueResult<usize> {
        self.ensure_live()?;
        Ok(self.core.clear())
    }

    /// Stop starting new items; running items finish
    pub fn pause(&self) -> QueueResult<()> {
        self.ensure_live()?;
        self.core.set_paused(true);
        Ok(())
    }

    pub fn resume(&self) -> QueueResult<()> {
        self.ensure_live()?;
        self.core.set_paused(false);
        Ok(())
    }

    /// Tear the queue down; idempotent
    pub fn dispose(&self) {
        self.core.dispose();
    }

    /// Pending plus running items
    pub fn count(&self) -> usize {
        self.core.count()
    }

    /// Items currently executing
    pub fn running(&self) -> usize {
        self.core.running()
    }

    /// Items waiting to be picked up
    pub fn pending(&self) -> usize {
        self.core.pending()
    }

    pub fn is_busy(&self) -> bool {
        self.core.count() > 0
    }

    pub fn is_empty(&self) -> bool {
        self.core.pending() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.core.is_complete()
    }

    pub fn is_paused(&self) -> bool {
        self.core.is_paused()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    pub fn threads(&self) -> usize {
        self.core.threads()
    }

    pub fn name(&self) -> Option<&str> {
        self.core.options().name()
    }

    pub fn mode(&self) -> QueueMode {
        self.core.mode()
    }

    /// The queue's own token, a child of the token it was created with
    pub fn token(&self) -> &CancellationToken {
        self.core.token()
    }

    /// Whether this queue created its named primitive
    ///
    /// `None` for unnamed queues and for modes without a named primitive.
    pub fn is_owner(&self) -> Option<bool> {
        self.core.primitive_owner()
    }

    pub fn on_work_started<F>(&self, handler: F)
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.core.on(QueueEventKind::WorkStarted, Arc::new(handler));
    }

    pub fn on_work_completed<F>(&self, handler: F)
    where
        F: Fn(&QueueEvent) + Send + Sync + 'static,
    {
        self.core.on(QueueEventKind::WorkCompleted, Arc::new(handler));
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.core.subscribe()
    }

    fn ensure_live(&self) -> QueueResult<()> {
        if self.core.is_disposed() {
            return Err(QueueError::Disposed {
                queue: self.core.label().to_string(),
            });
        }
        Ok(())
    }
}

impl<T: Send + 'static> fmt::Debug for ProducerConsumerQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.core, f)
    }
}

impl<T: Send + 'static> Drop for ProducerConsumerQueue<T> {
    fn drop(&mut self) {
        self.core.dispose();
    }
}
