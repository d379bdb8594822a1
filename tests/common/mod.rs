//! Shared helpers for engine integration tests

use pcq::core::cancel::CancellationToken;
use pcq::queue::{queue_maximum, ProducerConsumerQueue, QueueMode, QueueOptions, TaskResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// `wanted`, capped at what this machine accepts
pub fn threads(wanted: usize) -> usize {
    wanted.min(queue_maximum())
}

pub type Outcomes = Arc<Mutex<Vec<(u64, TaskResult)>>>;

/// A queue whose items sleep for their state in milliseconds and record
/// their outcome
pub fn sleeping_queue(mode: QueueMode, threads: usize) -> (ProducerConsumerQueue<u64>, Outcomes) {
    let outcomes: Outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    let options = QueueOptions::<u64>::builder()
        .threads(threads)
        .poll_interval(Duration::from_millis(50))
        .threshold(Duration::from_millis(100))
        .execute(|item| {
            std::thread::sleep(Duration::from_millis(*item.state()));
            Ok(())
        })
        .on_result(move |item, result| sink.lock().unwrap().push((*item.state(), result)))
        .build()
        .unwrap();
    let queue = ProducerConsumerQueue::new(mode, options, &CancellationToken::new()).unwrap();
    (queue, outcomes)
}
