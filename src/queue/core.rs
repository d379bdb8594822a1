//! Strategy-independent queue engine
//!
//! [`QueueCore`] owns everything the strategies have in common: lifecycle
//! flags, the outstanding-item counter, the completion barrier, pause
//! state, event publication and the execution of individual items. A
//! [`Strategy`] only decides how pending items reach an execution slot.
//!
//! Counting rules:
//! - `outstanding` is incremented when an item is accepted and decremented
//!   once it has been fully processed (or discarded), so `count()` always
//!   covers pending and running items.
//! - Dispatcher threads register with the completion barrier before they
//!   are spawned and leave it when they exit.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Once, RwLock};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::core::cancel::CancellationToken;
use crate::core::sync::lock_recover;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::events::{EventHandler, QueueEvent, QueueEventKind, QueueEvents};
use crate::queue::factory::QueueMode;
use crate::queue::item::{panic_message, ExecutionError, TaskResult, WorkItem};
use crate::queue::latch::CompletionBarrier;
use crate::queue::options::QueueOptions;

/// One way of draining the pending-item container
pub(crate) trait Strategy<T: Send + 'static>: Send + Sync {
    /// Spawn the dispatchers; called once, on the first enqueue
    fn start(&self, core: &Arc<QueueCore<T>>) -> QueueResult<()>;

    /// Hand an accepted item to the pending container
    fn push(&self, item: WorkItem<T>);

    /// Remove every item not yet picked up by a dispatcher
    fn drain(&self) -> Vec<WorkItem<T>>;

    /// Items waiting in the pending container
    fn pending(&self) -> usize;

    /// Wake dispatchers blocked on an empty container so they re-check
    /// completion and cancellation
    fn wake(&self) {}

    /// Whether this queue created its named primitive; `None` when the
    /// strategy uses no named primitive
    fn primitive_owner(&self) -> Option<bool> {
        None
    }
}

pub(crate) struct QueueCore<T: Send + 'static> {
    mode: QueueMode,
    label: String,
    options: QueueOptions<T>,
    token: CancellationToken,
    strategy: Box<dyn Strategy<T>>,
    // Readers: enqueue. Writer: mark_complete. Keeps "complete" and
    // "accepted" mutually exclusive.
    gate: RwLock<()>,
    complete_marked: AtomicBool,
    disposed: AtomicBool,
    started: AtomicBool,
    start_lock: Mutex<()>,
    paused: Mutex<bool>,
    resumed: Condvar,
    outstanding: AtomicUsize,
    running: AtomicUsize,
    barrier: CompletionBarrier,
    work_started: Once,
    idle_lock: Mutex<()>,
    idle: Condvar,
    idle_watch: watch::Sender<u64>,
    events: QueueEvents,
}

impl<T: Send + 'static> QueueCore<T> {
    pub(crate) fn new(
        mode: QueueMode,
        options: QueueOptions<T>,
        token: CancellationToken,
        strategy: Box<dyn Strategy<T>>,
    ) -> Arc<Self> {
        let label = options
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| mode.to_string());
        let (idle_watch, _) = watch::channel(0);

        Arc::new(Self {
            mode,
            label,
            options,
            token,
            strategy,
            gate: RwLock::new(()),
            complete_marked: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            started: AtomicBool::new(false),
            start_lock: Mutex::new(()),
            paused: Mutex::new(false),
            resumed: Condvar::new(),
            outstanding: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            barrier: CompletionBarrier::new(),
            work_started: Once::new(),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
            idle_watch,
            events: QueueEvents::new(),
        })
    }

    pub(crate) fn mode(&self) -> QueueMode {
        self.mode
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn options(&self) -> &QueueOptions<T> {
        &self.options
    }

    pub(crate) fn threads(&self) -> usize {
        self.options.threads()
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.options.poll_interval()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn count(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn pending(&self) -> usize {
        self.strategy.pending()
    }

    pub(crate) fn primitive_owner(&self) -> Option<bool> {
        self.strategy.primitive_owner()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.complete_marked.load(Ordering::SeqCst)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn is_paused(&self) -> bool {
        *lock_recover(self.paused.lock())
    }

    /// Nothing pending or running, or the completion barrier has fired
    pub(crate) fn is_idle(&self) -> bool {
        self.count() == 0 || self.barrier.is_released()
    }

    /// Dispatchers should stop waiting for new items
    pub(crate) fn is_draining(&self) -> bool {
        self.is_complete() || self.is_cancelled()
    }

    pub(crate) fn enqueue(self: &Arc<Self>, item: WorkItem<T>) -> QueueResult<()> {
        {
            let _gate = lock_recover(self.gate.read());
            if self.is_disposed() {
                return Err(QueueError::Disposed {
                    queue: self.label.clone(),
                });
            }
            if self.is_complete() {
                return Err(QueueError::AlreadyCompleted {
                    queue: self.label.clone(),
                });
            }
            if self.is_cancelled() {
                return Err(QueueError::Cancelled {
                    queue: self.label.clone(),
                });
            }

            self.ensure_started()?;
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            self.strategy.push(item);
        }

        if let Some(pause) = self.options.sleep_after_enqueue() {
            self.options.clock().sleep(pause, &self.token);
        }
        Ok(())
    }

    fn ensure_started(self: &Arc<Self>) -> QueueResult<()> {
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = lock_recover(self.start_lock.lock());
        if self.started.load(Ordering::Acquire) {
            return Ok(());
        }

        log::debug!(
            "{}: starting {} dispatchers ({} threads, background: {}, priority: {})",
            self.label,
            self.mode,
            self.threads(),
            self.options.background(),
            self.options.priority()
        );
        self.strategy.start(self)?;
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    /// Stop accepting items; idempotent
    pub(crate) fn mark_complete(&self) {
        {
            let _gate = lock_recover(self.gate.write());
            if self.complete_marked.swap(true, Ordering::SeqCst) {
                return;
            }
        }

        log::debug!(
            "{}: complete marked with {} item(s) outstanding",
            self.label,
            self.count()
        );
        self.strategy.wake();
        self.try_fire_completion();
    }

    pub(crate) fn cancel(&self) {
        if !self.token.is_cancelled() {
            log::debug!("{}: cancellation requested", self.label);
        }
        self.token.cancel();
        self.strategy.wake();
        {
            let _paused = lock_recover(self.paused.lock());
            self.resumed.notify_all();
        }
        self.notify_idle();
    }

    /// Discard every pending item; returns how many were dropped
    pub(crate) fn clear(&self) -> usize {
        let items = self.strategy.drain();
        let cleared = items.len();
        for item in items {
            self.discard(item);
        }
        if cleared > 0 {
            log::debug!("{}: cleared {} pending item(s)", self.label, cleared);
        }
        cleared
    }

    /// Complete, optionally drain, then cancel and clear
    ///
    /// An enforced stop cancels before marking complete, so no dispatcher
    /// woken by the completion starts another item.
    pub(crate) fn halt(&self, enforce: bool) -> bool {
        log::debug!("{}: stop requested (enforce: {})", self.label, enforce);
        let drained = if enforce {
            self.cancel();
            self.mark_complete();
            true
        } else {
            self.mark_complete();
            self.set_paused(false);
            let drained = self.wait_idle(None);
            self.cancel();
            drained
        };
        self.clear();
        self.set_paused(false);
        drained
    }

    pub(crate) async fn halt_async(&self, enforce: bool) -> bool {
        log::debug!("{}: stop requested (enforce: {})", self.label, enforce);
        let drained = if enforce {
            self.cancel();
            self.mark_complete();
            true
        } else {
            self.mark_complete();
            self.set_paused(false);
            let drained = self.wait_idle_async(None).await;
            self.cancel();
            drained
        };
        self.clear();
        self.set_paused(false);
        drained
    }

    /// Block until idle; `false` on timeout or cancellation
    pub(crate) fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let slice = self.poll_interval();
        let mut guard = lock_recover(self.idle_lock.lock());
        loop {
            if self.is_idle() {
                return true;
            }
            if self.is_cancelled() {
                return false;
            }
            let wait_for = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    (deadline - now).min(slice)
                }
                None => slice,
            };
            guard = lock_recover(self.idle.wait_timeout(guard, wait_for)).0;
        }
    }

    pub(crate) async fn wait_idle_async(&self, timeout: Option<Duration>) -> bool {
        let mut changes = self.idle_watch.subscribe();
        let deadline = timeout.map(|timeout| tokio::time::Instant::now() + timeout);
        loop {
            if self.is_idle() {
                return true;
            }
            if self.is_cancelled() {
                return false;
            }

            let next = async {
                tokio::select! {
                    _ = changes.changed() => {}
                    _ = self.token.cancelled() => {}
                }
            };
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, next).await.is_err() {
                        return self.is_idle();
                    }
                }
                None => next.await,
            }
        }
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        let mut state = lock_recover(self.paused.lock());
        if *state != paused {
            log::debug!(
                "{}: {}",
                self.label,
                if paused { "paused" } else { "resumed" }
            );
        }
        *state = paused;
        if !paused {
            self.resumed.notify_all();
        }
    }

    /// Block while paused; `false` once cancellation is observed
    pub(crate) fn wait_while_paused(&self) -> bool {
        let mut paused = lock_recover(self.paused.lock());
        while *paused {
            if self.is_cancelled() {
                return false;
            }
            paused = lock_recover(self.resumed.wait_timeout(paused, self.poll_interval())).0;
        }
        !self.is_cancelled()
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        log::debug!("{}: disposing", self.label);
        if self.options.wait_on_dispose() {
            self.set_paused(false);
            self.mark_complete();
            if !self.wait_idle(None) {
                log::debug!("{}: dispose interrupted by cancellation", self.label);
            }
        } else {
            self.halt(true);
        }
    }

    pub(crate) fn on(&self, kind: QueueEventKind, handler: EventHandler) {
        self.events.on(kind, handler);
    }

    pub(crate) fn subscribe(&self) -> tokio::sync::broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Execute one item with its callbacks
    pub(crate) fn run(&self, item: WorkItem<T>) {
        self.process(item, None);
    }

    /// Report an item as failed without executing it
    pub(crate) fn abandon(&self, item: WorkItem<T>, error: ExecutionError) {
        log::warn!("{}: item abandoned: {}", self.label, error);
        self.process(item, Some(error));
    }

    /// Drop an item without invoking any callback
    pub(crate) fn discard(&self, item: WorkItem<T>) {
        log::trace!("{}: item discarded", self.label);
        drop(item);
        self.finish_one();
    }

    fn process(&self, mut item: WorkItem<T>, forced: Option<ExecutionError>) {
        if forced.is_none() && self.is_cancelled() {
            self.discard(item);
            return;
        }

        self.running.fetch_add(1, Ordering::SeqCst);
        item.attach(self.token.clone());

        let result = match forced {
            Some(error) => Some(item.record(Err(error))),
            None if self.is_scheduled(&item) => {
                self.work_started
                    .call_once(|| self.publish(QueueEventKind::WorkStarted));
                Some(self.execute(&mut item))
            }
            None => {
                log::trace!("{}: item skipped by scheduled callback", self.label);
                None
            }
        };

        if let Some(result) = result {
            self.report(&item, result);
        }
        self.cleanup(&mut item);

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.finish_one();
    }

    fn is_scheduled(&self, item: &WorkItem<T>) -> bool {
        let Some(scheduled) = self.options.scheduled() else {
            return true;
        };
        panic::catch_unwind(AssertUnwindSafe(|| scheduled(item))).unwrap_or_else(|payload| {
            log::warn!(
                "{}: scheduled callback panicked, skipping item: {}",
                self.label,
                panic_message(payload.as_ref())
            );
            false
        })
    }

    fn execute(&self, item: &mut WorkItem<T>) -> TaskResult {
        let execute = item
            .execute
            .clone()
            .unwrap_or_else(|| Arc::clone(self.options.execute()));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(item)))
            .unwrap_or_else(|payload| Err(ExecutionError::from_panic(payload)));

        match &outcome {
            Ok(()) => log::trace!("{}: item succeeded", self.label),
            Err(err) => log::debug!("{}: item failed: {}", self.label, err),
        }
        item.record(outcome)
    }

    fn report(&self, item: &WorkItem<T>, result: TaskResult) {
        let callback = item
            .on_result
            .clone()
            .or_else(|| self.options.on_result().cloned());
        if let Some(callback) = callback {
            self.guarded("result", || callback(item, result));
        }
    }

    fn cleanup(&self, item: &mut WorkItem<T>) {
        let callback = item
            .cleanup
            .clone()
            .or_else(|| self.options.cleanup().cloned());
        if let Some(callback) = callback {
            self.guarded("cleanup", || callback(item));
        }
    }

    fn guarded(&self, what: &str, f: impl FnOnce()) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            log::warn!(
                "{}: {} callback panicked: {}",
                self.label,
                what,
                panic_message(payload.as_ref())
            );
        }
    }

    fn finish_one(&self) {
        let previous = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        if previous <= 1 {
            self.notify_idle();
        }
    }

    fn notify_idle(&self) {
        {
            let _guard = lock_recover(self.idle_lock.lock());
            self.idle.notify_all();
        }
        self.idle_watch.send_modify(|generation| *generation += 1);
    }

    fn publish(&self, kind: QueueEventKind) {
        self.events.publish(QueueEvent::new(
            kind,
            self.label.clone(),
            self.options.clock().system_time(),
            self.count(),
        ));
    }

    fn try_fire_completion(&self) {
        if self.is_complete() && self.barrier.in_flight() == 0 && self.barrier.try_release() {
            log::debug!("{}: all work completed", self.label);
            self.publish(QueueEventKind::WorkCompleted);
            self.notify_idle();
        }
    }

    fn dispatcher_exit(&self) {
        if self.is_cancelled() {
            self.clear();
        }
        let remaining = self.barrier.leave();
        log::trace!("{}: dispatcher exited, {} remaining", self.label, remaining);
        self.try_fire_completion();
    }

    pub(crate) fn thread_name(&self, role: &str, index: usize) -> String {
        format!("{}-{}-{}-{}", self.label, role, index, self.options.priority()).replace('\0', "")
    }

    /// Spawn a dispatcher thread registered with the completion barrier
    pub(crate) fn spawn_dispatcher<F>(self: &Arc<Self>, role: &str, index: usize, body: F) -> QueueResult<()>
    where
        F: FnOnce(&Arc<QueueCore<T>>) + Send + 'static,
    {
        self.barrier.enter();
        let exit = DispatcherExit(Arc::clone(self));
        thread::Builder::new()
            .name(self.thread_name(role, index))
            .spawn(move || body(&exit.0))
            .map(|_| ())
            .map_err(|source| QueueError::Spawn {
                queue: self.label.clone(),
                source,
            })
    }
}

impl<T: Send + 'static> fmt::Debug for QueueCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueCore")
            .field("mode", &self.mode)
            .field("label", &self.label)
            .field("count", &self.count())
            .field("running", &self.running())
            .field("complete", &self.is_complete())
            .field("cancelled", &self.is_cancelled())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// Leaves the barrier when the dispatcher closure ends, including when the
// thread could not be spawned and the closure is dropped unrun.
struct DispatcherExit<T: Send + 'static>(Arc<QueueCore<T>>);

impl<T: Send + 'static> Drop for DispatcherExit<T> {
    fn drop(&mut self) {
        self.0.dispatcher_exit();
    }
}

/// An item handed to a dedicated thread
///
/// If the thread is never started, or exits without running the item, the
/// item is reported as failed when this handle drops so the outstanding
/// count stays exact.
pub(crate) struct ItemRun<T: Send + 'static> {
    core: Arc<QueueCore<T>>,
    item: Option<WorkItem<T>>,
}

impl<T: Send + 'static> ItemRun<T> {
    pub(crate) fn new(core: &Arc<QueueCore<T>>, item: WorkItem<T>) -> Self {
        Self {
            core: Arc::clone(core),
            item: Some(item),
        }
    }

    pub(crate) fn core(&self) -> &Arc<QueueCore<T>> {
        &self.core
    }

    pub(crate) fn run(mut self) {
        if let Some(item) = self.item.take() {
            self.core.run(item);
        }
    }

    pub(crate) fn fail(mut self, error: ExecutionError) {
        if let Some(item) = self.item.take() {
            self.core.abandon(item, error);
        }
    }
}

impl<T: Send + 'static> Drop for ItemRun<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.core
                .abandon(item, ExecutionError::failed("item thread did not run the item"));
        }
    }
}
