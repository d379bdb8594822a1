//! Recording callbacks shared by the queue tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::cancel::CancellationToken;
use crate::queue::{
    queue_maximum, ProducerConsumerQueue, QueueMode, QueueOptions, QueueOptionsBuilder, TaskResult,
};

/// Thread count capped to what the queue accepts; test builds accept at
/// least [`TEST_QUEUE_MAXIMUM`](crate::queue::options::TEST_QUEUE_MAXIMUM)
pub(crate) fn threads(wanted: usize) -> usize {
    wanted.min(queue_maximum())
}

/// Execution span of one item
#[derive(Debug, Clone, Copy)]
pub(crate) struct Span {
    pub(crate) id: u32,
    pub(crate) started: Instant,
    pub(crate) finished: Instant,
}

/// Records what the execute and result callbacks observe
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    active: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<u32>>,
    spans: Mutex<Vec<Span>>,
    results: Mutex<Vec<(u32, TaskResult)>>,
    cleanups: AtomicUsize,
}

impl Recorder {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run `work` as one execution of item `id`
    pub(crate) fn execute(&self, id: u32, work: Duration) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        self.started.lock().unwrap().push(id);

        let started = Instant::now();
        thread::sleep(work);
        let finished = Instant::now();

        self.spans.lock().unwrap().push(Span {
            id,
            started,
            finished,
        });
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn record(&self, id: u32, result: TaskResult) {
        self.results.lock().unwrap().push((id, result));
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn started(&self) -> Vec<u32> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn spans(&self) -> Vec<Span> {
        self.spans.lock().unwrap().clone()
    }

    pub(crate) fn results(&self) -> Vec<(u32, TaskResult)> {
        self.results.lock().unwrap().clone()
    }

    pub(crate) fn result_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.results().into_iter().map(|(id, _)| id).collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

/// Options whose items sleep for `work` and report to `recorder`
pub(crate) fn recording_options(
    threads: usize,
    work: Duration,
    recorder: &Arc<Recorder>,
) -> QueueOptionsBuilder<u32> {
    let executed = Arc::clone(recorder);
    let reported = Arc::clone(recorder);
    let cleaned = Arc::clone(recorder);
    QueueOptions::builder()
        .threads(threads)
        .poll_interval(Duration::from_millis(50))
        .execute(move |item| {
            executed.execute(*item.state(), work);
            Ok(())
        })
        .on_result(move |item, result| reported.record(*item.state(), result))
        .cleanup(move |_| {
            cleaned.cleanups.fetch_add(1, Ordering::SeqCst);
        })
}

pub(crate) fn queue(mode: QueueMode, options: QueueOptionsBuilder<u32>) -> ProducerConsumerQueue<u32> {
    ProducerConsumerQueue::new(mode, options.build().unwrap(), &CancellationToken::new()).unwrap()
}

/// Enqueue ids `0..count`, complete, and wait for the drain
pub(crate) fn run_to_completion(queue: &ProducerConsumerQueue<u32>, count: u32) {
    for id in 0..count {
        queue.enqueue(id).unwrap();
    }
    queue.complete().unwrap();
    assert!(
        queue.wait(Some(Duration::from_secs(10))),
        "{} queue did not drain",
        queue.mode()
    );
}
