//! Producer-Consumer Work Queue
//!
//! A family of interchangeable work queues that accept items from any
//! number of producers and execute them with bounded concurrency,
//! supporting graceful completion, forced cancellation, draining, pausing
//! and (for some strategies) cross-process mutual exclusion.
//!
//! # Overview
//!
//! Every queue is a [`ProducerConsumerQueue`] running one [`QueueMode`]:
//!
//! - **WorkerPool**: N long-lived workers pulling from a shared FIFO
//! - **Semaphore**: one dispatcher, one thread per item, N permits
//!   (named queues share a named semaphore)
//! - **WaitAndPulse**: N workers blocking on a condition variable
//! - **Pipeline**: unbounded buffer feeding N processors
//! - **TaskGroup**: batches of N items, each batch awaited in full
//! - **ThresholdTaskGroup**: like TaskGroup, partial batches flush after a
//!   threshold
//! - **Mutex**: one thread per item, serialised by a (named) mutex
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐ ┌────────────┐
//! │ Producer A │ │ Producer B │
//! └─────┬──────┘ └─────┬──────┘
//!       │ enqueue      │ enqueue
//!       ▼              ▼
//! ┌───────────────────────────────────────────────────────┐
//! │                    QueueCore                          │
//! │  lifecycle · outstanding count · pause · events       │
//! │  ┌─────────────────────────────────────────────────┐  │
//! │  │ Strategy (pending container + dispatchers)      │  │
//! │  │   ┌───┬───┬───┬───┬───┐                         │  │
//! │  │   │ 1 │ 2 │ 3 │ 4 │...│ ──► worker / item thread │  │
//! │  │   └───┴───┴───┴───┴───┘                         │  │
//! │  └─────────────────────────────────────────────────┘  │
//! │  completion barrier (N+1) ──► WorkCompleted (once)    │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pcq::core::cancel::CancellationToken;
//! use pcq::queue::{ProducerConsumerQueue, QueueMode, QueueOptions, TaskResult};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = QueueOptions::<u64>::builder()
//!     .threads(4)
//!     .execute(|item| {
//!         std::thread::sleep(Duration::from_millis(*item.state()));
//!         Ok(())
//!     })
//!     .on_result(|item, result| {
//!         if result != TaskResult::Success {
//!             eprintln!("item {} ended with {}", item.state(), result);
//!         }
//!     })
//!     .build()?;
//!
//! let token = CancellationToken::new();
//! let queue = ProducerConsumerQueue::new(QueueMode::WorkerPool, options, &token)?;
//!
//! for delay in [50u64, 10, 30] {
//!     queue.enqueue(delay)?;
//! }
//! queue.complete()?;
//! assert!(queue.wait(Some(Duration::from_secs(2))));
//! # Ok(())
//! # }
//! ```

pub(crate) mod core;
mod engine;
mod error;
mod events;
mod factory;
mod item;
mod latch;
pub mod named;
mod options;
mod strategy;

pub use engine::ProducerConsumerQueue;
pub use error::{QueueError, QueueResult};
pub use events::{EventHandler, QueueEvent, QueueEventKind};
pub use factory::QueueMode;
pub use item::{CleanupFn, ExecuteFn, ExecutionError, ResultFn, ScheduledFn, TaskResult, WorkItem};
pub use options::{
    queue_maximum, QueueOptions, QueueOptionsBuilder, ThreadPriority, DEFAULT_POLL_INTERVAL,
    MINIMUM_POLL_INTERVAL, QUEUE_MINIMUM,
};

#[cfg(test)]
mod tests;
