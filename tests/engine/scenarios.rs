//! Multi-producer and lifecycle scenarios against every strategy

use crate::common::{sleeping_queue, threads};
use pcq::queue::{QueueError, QueueEventKind, QueueMode, TaskResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;

#[test]
fn test_concurrent_producers_every_mode() {
    for mode in QueueMode::iter() {
        let (queue, outcomes) = sleeping_queue(mode, threads(4));
        let queue = Arc::new(queue);

        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..5u64 {
                        queue.enqueue((p + i) % 3).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        queue.complete().unwrap();
        assert!(queue.wait(Some(Duration::from_secs(5))), "{} did not drain", mode);
        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 20, "{}", mode);
        assert!(outcomes.iter().all(|(_, r)| *r == TaskResult::Success));
        assert!(queue.is_empty());
    }
}

#[test]
fn test_worker_pool_wall_time_tracks_thread_count() {
    let n = threads(4);
    let (queue, outcomes) = sleeping_queue(QueueMode::WorkerPool, n);

    let start = Instant::now();
    for _ in 0..10 {
        queue.enqueue(50u64).unwrap();
    }
    queue.complete().unwrap();
    assert!(queue.wait(Some(Duration::from_secs(2))));
    let elapsed = start.elapsed();

    assert_eq!(outcomes.lock().unwrap().len(), 10);
    let rounds = 10_u32.div_ceil(n as u32);
    assert!(elapsed >= Duration::from_millis(50) * rounds - Duration::from_millis(10));
}

#[test]
fn test_enqueue_after_complete_fails() {
    let (queue, _) = sleeping_queue(QueueMode::Pipeline, 1);
    queue.complete().unwrap();

    let err = queue.enqueue(1u64).unwrap_err();
    assert!(matches!(err, QueueError::AlreadyCompleted { .. }));
}

#[test]
fn test_completed_event_fires_once_per_queue() {
    for mode in QueueMode::iter() {
        let (queue, _) = sleeping_queue(mode, threads(2));
        let completed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completed);
        queue.on_work_completed(move |event| {
            assert_eq!(event.kind, QueueEventKind::WorkCompleted);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..3 {
            queue.enqueue(1u64).unwrap();
        }
        queue.complete().unwrap();
        queue.complete().unwrap();
        assert!(queue.wait(Some(Duration::from_secs(2))));
        assert!(queue.wait(Some(Duration::from_secs(2))));

        // The event follows the last dispatcher out, shortly after idle
        let deadline = Instant::now() + Duration::from_secs(2);
        while completed.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(completed.load(Ordering::SeqCst), 1, "{}", mode);
    }
}

#[test]
fn test_stop_without_enforce_drains() {
    let (queue, outcomes) = sleeping_queue(QueueMode::WaitAndPulse, 1);
    for _ in 0..4 {
        queue.enqueue(10u64).unwrap();
    }

    assert!(queue.stop(false));
    assert_eq!(outcomes.lock().unwrap().len(), 4);
    assert!(queue.is_complete());
}

#[test]
fn test_dispose_then_operations() {
    let (queue, _) = sleeping_queue(QueueMode::Semaphore, 1);
    queue.dispose();
    queue.dispose();

    assert!(queue.is_disposed());
    assert!(matches!(queue.enqueue(1u64), Err(QueueError::Disposed { .. })));
    assert!(!queue.wait(Some(Duration::from_millis(10))));
}
