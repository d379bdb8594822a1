//! Validated queue configuration
//!
//! [`QueueOptions`] is shared by every strategy. It is only obtainable
//! through [`QueueOptionsBuilder::build`], which enforces the thread-count
//! range and the presence of an execute callback.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::time::{Clock, SystemClock};
use crate::core::validation::{normalize_name, validate_range, ValidationError};
use crate::queue::item::{CleanupFn, ExecuteFn, ExecutionError, ResultFn, ScheduledFn, TaskResult, WorkItem};
use crate::queue::named::{default_primitives, NamedPrimitives};

/// Smallest accepted thread count
pub const QUEUE_MINIMUM: usize = 1;

/// Default interval at which blocked dispatchers re-check cancellation
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lower bound for the poll interval
pub const MINIMUM_POLL_INTERVAL: Duration = Duration::from_millis(50);

static QUEUE_MAXIMUM: Lazy<usize> = Lazy::new(|| {
    let logical = num_cpus::get().max(QUEUE_MINIMUM);
    if logical > num_cpus::get_physical() {
        logical * 2
    } else {
        logical
    }
});

/// Unit tests size batches and pools beyond what a small host reports
#[cfg(test)]
pub(crate) const TEST_QUEUE_MAXIMUM: usize = 8;

/// Largest accepted thread count
///
/// The logical CPU count, doubled when hardware multithreading is present.
/// Computed once per process.
#[cfg(not(test))]
pub fn queue_maximum() -> usize {
    *QUEUE_MAXIMUM
}

/// Largest accepted thread count, never below [`TEST_QUEUE_MAXIMUM`]
#[cfg(test)]
pub fn queue_maximum() -> usize {
    (*QUEUE_MAXIMUM).max(TEST_QUEUE_MAXIMUM)
}

/// Scheduling hint for dispatcher threads
///
/// Informational only: it is appended to dispatcher and item thread names
/// and logged when the dispatchers start.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ThreadPriority {
    Lowest,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    Highest,
}

/// Configuration shared by every queue strategy
pub struct QueueOptions<T> {
    threads: usize,
    name: Option<String>,
    threshold: Option<Duration>,
    background: bool,
    priority: ThreadPriority,
    sleep_after_enqueue: Option<Duration>,
    wait_on_dispose: bool,
    poll_interval: Duration,
    execute: ExecuteFn<T>,
    on_result: Option<ResultFn<T>>,
    cleanup: Option<CleanupFn<T>>,
    scheduled: Option<ScheduledFn<T>>,
    clock: Arc<dyn Clock>,
    primitives: Arc<dyn NamedPrimitives>,
}

impl<T> QueueOptions<T> {
    pub fn builder() -> QueueOptionsBuilder<T> {
        QueueOptionsBuilder::new()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Trimmed name; presence selects cross-process primitives
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn threshold(&self) -> Option<Duration> {
        self.threshold
    }

    pub fn background(&self) -> bool {
        self.background
    }

    pub fn priority(&self) -> ThreadPriority {
        self.priority
    }

    pub fn sleep_after_enqueue(&self) -> Option<Duration> {
        self.sleep_after_enqueue
    }

    pub fn wait_on_dispose(&self) -> bool {
        self.wait_on_dispose
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn primitives(&self) -> &Arc<dyn NamedPrimitives> {
        &self.primitives
    }

    pub(crate) fn execute(&self) -> &ExecuteFn<T> {
        &self.execute
    }

    pub(crate) fn on_result(&self) -> Option<&ResultFn<T>> {
        self.on_result.as_ref()
    }

    pub(crate) fn cleanup(&self) -> Option<&CleanupFn<T>> {
        self.cleanup.as_ref()
    }

    pub(crate) fn scheduled(&self) -> Option<&ScheduledFn<T>> {
        self.scheduled.as_ref()
    }
}

impl<T> Clone for QueueOptions<T> {
    fn clone(&self) -> Self {
        Self {
            threads: self.threads,
            name: self.name.clone(),
            threshold: self.threshold,
            background: self.background,
            priority: self.priority,
            sleep_after_enqueue: self.sleep_after_enqueue,
            wait_on_dispose: self.wait_on_dispose,
            poll_interval: self.poll_interval,
            execute: Arc::clone(&self.execute),
            on_result: self.on_result.clone(),
            cleanup: self.cleanup.clone(),
            scheduled: self.scheduled.clone(),
            clock: Arc::clone(&self.clock),
            primitives: Arc::clone(&self.primitives),
        }
    }
}

impl<T> fmt::Debug for QueueOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueOptions")
            .field("threads", &self.threads)
            .field("name", &self.name)
            .field("threshold", &self.threshold)
            .field("background", &self.background)
            .field("priority", &self.priority)
            .field("sleep_after_enqueue", &self.sleep_after_enqueue)
            .field("wait_on_dispose", &self.wait_on_dispose)
            .field("poll_interval", &self.poll_interval)
            .field("clock", &self.clock)
            .field("primitives", &self.primitives)
            .finish_non_exhaustive()
    }
}

/// Builder for [`QueueOptions`]
pub struct QueueOptionsBuilder<T> {
    threads: Option<usize>,
    name: Option<String>,
    threshold: Option<Duration>,
    background: bool,
    priority: ThreadPriority,
    sleep_after_enqueue: Option<Duration>,
    wait_on_dispose: bool,
    poll_interval: Duration,
    execute: Option<ExecuteFn<T>>,
    on_result: Option<ResultFn<T>>,
    cleanup: Option<CleanupFn<T>>,
    scheduled: Option<ScheduledFn<T>>,
    clock: Option<Arc<dyn Clock>>,
    primitives: Option<Arc<dyn NamedPrimitives>>,
}

impl<T> Default for QueueOptionsBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueueOptionsBuilder<T> {
    pub fn new() -> Self {
        Self {
            threads: None,
            name: None,
            threshold: None,
            background: true,
            priority: ThreadPriority::default(),
            sleep_after_enqueue: None,
            wait_on_dispose: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            execute: None,
            on_result: None,
            cleanup: None,
            scheduled: None,
            clock: None,
            primitives: None,
        }
    }

    /// Worker count; defaults to [`queue_maximum`]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Batch flush threshold; zero means no threshold
    pub fn threshold(mut self, threshold: Duration) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Threshold in milliseconds as found in config files; negative values clamp to zero
    pub fn threshold_millis(self, millis: i64) -> Self {
        self.threshold(Duration::from_millis(millis.max(0) as u64))
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn priority(mut self, priority: ThreadPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Pause applied after every enqueue (producer backpressure)
    pub fn sleep_after_enqueue(mut self, pause: Duration) -> Self {
        self.sleep_after_enqueue = Some(pause);
        self
    }

    /// Whether dropping the queue drains it (`true`) or stops it forcibly
    pub fn wait_on_dispose(mut self, wait: bool) -> Self {
        self.wait_on_dispose = wait;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn execute<F>(mut self, execute: F) -> Self
    where
        F: Fn(&mut WorkItem<T>) -> Result<(), ExecutionError> + Send + Sync + 'static,
    {
        self.execute = Some(Arc::new(execute));
        self
    }

    pub fn on_result<F>(mut self, on_result: F) -> Self
    where
        F: Fn(&WorkItem<T>, TaskResult) + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(on_result));
        self
    }

    pub fn cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&mut WorkItem<T>) + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(cleanup));
        self
    }

    pub fn scheduled<F>(mut self, scheduled: F) -> Self
    where
        F: Fn(&WorkItem<T>) -> bool + Send + Sync + 'static,
    {
        self.scheduled = Some(Arc::new(scheduled));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn primitives(mut self, primitives: Arc<dyn NamedPrimitives>) -> Self {
        self.primitives = Some(primitives);
        self
    }

    pub fn build(self) -> Result<QueueOptions<T>, ValidationError> {
        let threads = validate_range(
            "threads",
            self.threads.unwrap_or_else(queue_maximum),
            QUEUE_MINIMUM,
            queue_maximum(),
        )?;
        let execute = self
            .execute
            .ok_or_else(|| ValidationError::new("an execute callback is required"))?;

        Ok(QueueOptions {
            threads,
            name: normalize_name(self.name.as_deref()),
            threshold: self.threshold.filter(|threshold| !threshold.is_zero()),
            background: self.background,
            priority: self.priority,
            sleep_after_enqueue: self.sleep_after_enqueue.filter(|pause| !pause.is_zero()),
            wait_on_dispose: self.wait_on_dispose,
            poll_interval: self.poll_interval.max(MINIMUM_POLL_INTERVAL),
            execute,
            on_result: self.on_result,
            cleanup: self.cleanup,
            scheduled: self.scheduled,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            primitives: self.primitives.unwrap_or_else(default_primitives),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn builder() -> QueueOptionsBuilder<u32> {
        QueueOptions::builder().execute(|_item| Ok(()))
    }

    #[test]
    fn test_queue_maximum_bounds() {
        assert!(queue_maximum() >= QUEUE_MINIMUM);
        assert!(queue_maximum() >= num_cpus::get());
        assert!(queue_maximum() >= TEST_QUEUE_MAXIMUM);
        assert_eq!(queue_maximum(), queue_maximum());
    }

    #[test]
    fn test_defaults() {
        let options = builder().build().unwrap();
        assert_eq!(options.threads(), queue_maximum());
        assert_eq!(options.name(), None);
        assert_eq!(options.threshold(), None);
        assert!(options.wait_on_dispose());
        assert_eq!(options.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(options.priority(), ThreadPriority::Normal);
    }

    #[test]
    fn test_thread_count_range() {
        assert!(builder().threads(QUEUE_MINIMUM).build().is_ok());
        assert!(builder().threads(queue_maximum()).build().is_ok());

        let err = builder().threads(queue_maximum() + 1).build().unwrap_err();
        assert!(err.message().contains("threads must be between"));
        assert!(builder().threads(0).build().is_err());
    }

    #[test]
    fn test_missing_execute_callback() {
        let err = QueueOptions::<u32>::builder().threads(1).build().unwrap_err();
        assert_eq!(err.message(), "an execute callback is required");
    }

    #[test]
    fn test_name_is_trimmed() {
        assert_eq!(builder().name("  jobs  ").build().unwrap().name(), Some("jobs"));
        assert_eq!(builder().name("   ").build().unwrap().name(), None);
    }

    #[test]
    fn test_threshold_clamping() {
        assert_eq!(builder().threshold_millis(-50).build().unwrap().threshold(), None);
        assert_eq!(builder().threshold(Duration::ZERO).build().unwrap().threshold(), None);
        assert_eq!(
            builder().threshold_millis(100).build().unwrap().threshold(),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_poll_interval_floor() {
        let options = builder().poll_interval(Duration::from_millis(1)).build().unwrap();
        assert_eq!(options.poll_interval(), MINIMUM_POLL_INTERVAL);
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!(
            ThreadPriority::from_str("above-normal").unwrap(),
            ThreadPriority::AboveNormal
        );
        assert_eq!(ThreadPriority::from_str("HIGHEST").unwrap(), ThreadPriority::Highest);
        assert_eq!(ThreadPriority::BelowNormal.to_string(), "below-normal");
        assert!(ThreadPriority::from_str("realtime").is_err());
    }
}
