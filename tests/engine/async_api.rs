//! Awaiting queues from async code

use crate::common::{sleeping_queue, threads};
use pcq::queue::{QueueEventKind, QueueMode};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_async_resolves_after_drain() {
    let (queue, outcomes) = sleeping_queue(QueueMode::TaskGroup, threads(3));
    let mut events = queue.subscribe();

    for _ in 0..6 {
        queue.enqueue(5u64).unwrap();
    }
    queue.complete().unwrap();
    assert!(queue.wait_async(Some(Duration::from_secs(2))).await);
    assert_eq!(outcomes.lock().unwrap().len(), 6);

    let first = events.recv().await.unwrap();
    let second = events.recv().await.unwrap();
    assert_eq!(first.kind, QueueEventKind::WorkStarted);
    assert_eq!(second.kind, QueueEventKind::WorkCompleted);
    assert_eq!(second.count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_async_times_out_while_open() {
    let (queue, _) = sleeping_queue(QueueMode::WorkerPool, 1);
    queue.enqueue(200u64).unwrap();

    // Never completed, so waiting cannot succeed
    assert!(!queue.wait_async(Some(Duration::from_millis(50))).await);
    assert!(queue.stop_async(true).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_threshold_group_flushes_without_complete() {
    let (queue, outcomes) = sleeping_queue(QueueMode::ThresholdTaskGroup, threads(8));
    for _ in 0..3 {
        queue.enqueue(0u64).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(outcomes.lock().unwrap().len(), 3);
    queue.complete().unwrap();
    assert!(queue.wait_async(Some(Duration::from_secs(1))).await);
}
