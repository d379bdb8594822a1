//! Two-stage pipeline: unbounded buffer feeding bounded processors
//!
//! ```text
//! enqueue ──► buffer (unbounded) ──► forwarder ──► stage (bounded, N) ──► N processors
//! ```
//!
//! A single supervisor owns both stages. The forwarder only moves an item
//! when the stage has room, under the same lock `drain()` takes, so an
//! item is always either in the buffer, in the stage, or with a processor.
//! When the buffer is finished the forwarder drops the stage sender, the
//! processors drain what is left and exit, and the supervisor's exit
//! releases the completion barrier.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use crossbeam::select;
use std::sync::{Arc, Mutex};

use super::WakeSignal;
use crate::core::sync::lock_recover;
use crate::queue::core::{QueueCore, Strategy};
use crate::queue::error::QueueResult;
use crate::queue::item::{panic_message, ExecutionError, WorkItem};

/// Channels shared by the supervisor and the queue handle
struct Stages<T> {
    buffer: Receiver<WorkItem<T>>,
    stage: Receiver<WorkItem<T>>,
    capacity: usize,
    // Held while moving an item between stages and while draining
    transfer: Mutex<()>,
    // Pulsed on push and whenever a processor frees a stage slot
    ready_tx: Sender<()>,
    ready: Receiver<()>,
}

impl<T> Stages<T> {
    fn pulse(&self) {
        let _ = self.ready_tx.try_send(());
    }
}

pub(crate) struct Pipeline<T> {
    sender: Sender<WorkItem<T>>,
    stage_tx: Mutex<Option<Sender<WorkItem<T>>>>,
    stages: Arc<Stages<T>>,
    wake: Arc<WakeSignal>,
}

impl<T: Send + 'static> Pipeline<T> {
    pub(crate) fn new(threads: usize) -> Self {
        let (sender, buffer) = channel::unbounded();
        let (stage_tx, stage) = channel::bounded(threads);
        let (ready_tx, ready) = channel::bounded(1);
        Self {
            sender,
            stage_tx: Mutex::new(Some(stage_tx)),
            stages: Arc::new(Stages {
                buffer,
                stage,
                capacity: threads,
                transfer: Mutex::new(()),
                ready_tx,
                ready,
            }),
            wake: Arc::new(WakeSignal::new()),
        }
    }
}

impl<T: Send + 'static> Strategy<T> for Pipeline<T> {
    fn start(&self, core: &Arc<QueueCore<T>>) -> QueueResult<()> {
        // start() runs once per queue
        let Some(stage_tx) = lock_recover(self.stage_tx.lock()).take() else {
            return Ok(());
        };
        let stages = Arc::clone(&self.stages);
        let closed = self.wake.receiver();
        core.spawn_dispatcher("pipeline", 0, move |core| {
            supervise(core, &stages, &closed, stage_tx);
        })
    }

    fn push(&self, item: WorkItem<T>) {
        let _ = self.sender.send(item);
        self.stages.pulse();
    }

    fn drain(&self) -> Vec<WorkItem<T>> {
        let _transfer = lock_recover(self.stages.transfer.lock());
        let mut items: Vec<WorkItem<T>> = self.stages.stage.try_iter().collect();
        items.extend(self.stages.buffer.try_iter());
        items
    }

    fn pending(&self) -> usize {
        self.stages.buffer.len() + self.stages.stage.len()
    }

    fn wake(&self) {
        self.wake.fire();
    }
}

fn supervise<T: Send + 'static>(
    core: &Arc<QueueCore<T>>,
    stages: &Stages<T>,
    closed: &Receiver<()>,
    stage_tx: Sender<WorkItem<T>>,
) {
    let outcome = crossbeam::thread::scope(|scope| {
        for index in 0..core.threads() {
            let spawned = scope
                .builder()
                .name(core.thread_name("processor", index))
                .spawn(move |_| process(core, stages));
            if let Err(e) = spawned {
                log::error!("{}: failed to spawn processor: {}", core.label(), e);
            }
        }

        forward(core, stages, closed, stage_tx);
    });

    if let Err(payload) = outcome {
        log::error!(
            "{}: pipeline processor panicked: {}",
            core.label(),
            panic_message(payload.as_ref())
        );
    }
}

/// Move buffered items into free stage slots; returns how many moved
fn transfer<T: Send + 'static>(core: &QueueCore<T>, stages: &Stages<T>, stage: &Sender<WorkItem<T>>) -> usize {
    let _transfer = lock_recover(stages.transfer.lock());
    let mut moved = 0;
    while stage.len() < stages.capacity {
        let Ok(item) = stages.buffer.try_recv() else {
            break;
        };
        match stage.try_send(item) {
            Ok(()) => moved += 1,
            Err(TrySendError::Full(item)) | Err(TrySendError::Disconnected(item)) => {
                core.abandon(item, ExecutionError::failed("no pipeline processor available"));
                break;
            }
        }
    }
    moved
}

/// Feed the stage until the buffer is finished
fn forward<T: Send + 'static>(
    core: &QueueCore<T>,
    stages: &Stages<T>,
    closed: &Receiver<()>,
    stage: Sender<WorkItem<T>>,
) {
    while core.wait_while_paused() {
        if transfer(core, stages, &stage) > 0 {
            continue;
        }
        if core.is_draining() && stages.buffer.is_empty() {
            break;
        }
        select! {
            recv(stages.ready) -> _ => {}
            recv(closed) -> _ => {
                // The fired signal stays ready; wait for a free slot instead
                let _ = stages.ready.recv_timeout(core.poll_interval());
            }
            default(core.poll_interval()) => {}
        }
    }
}

fn process<T: Send + 'static>(core: &QueueCore<T>, stages: &Stages<T>) {
    loop {
        // Returns early once cancelled; run() then discards the item
        core.wait_while_paused();
        let Ok(item) = stages.stage.recv() else {
            break;
        };
        stages.pulse();
        core.run(item);
    }
}
