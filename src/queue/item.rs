//! Work items and their outcomes
//!
//! A [`WorkItem`] wraps caller state together with optional per-item
//! callbacks. The queue owns an item from `enqueue` until its cleanup
//! callback has run; during execution it attaches the queue's
//! cancellation token and records the outcome.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::core::cancel::CancellationToken;

/// Callback that performs the work of an item
pub type ExecuteFn<T> = Arc<dyn Fn(&mut WorkItem<T>) -> Result<(), ExecutionError> + Send + Sync>;

/// Callback that receives the classified outcome of an item
pub type ResultFn<T> = Arc<dyn Fn(&WorkItem<T>, TaskResult) + Send + Sync>;

/// Callback that runs after every processed item, whatever its outcome
pub type CleanupFn<T> = Arc<dyn Fn(&mut WorkItem<T>) + Send + Sync>;

/// Filter consulted right before an item runs; `false` skips it
pub type ScheduledFn<T> = Arc<dyn Fn(&WorkItem<T>) -> bool + Send + Sync>;

/// Outcome of an item
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum_macros::Display,
    strum_macros::EnumIter,
    strum_macros::AsRefStr,
)]
pub enum TaskResult {
    /// Not run (yet)
    #[default]
    None,
    Success,
    Error,
    Timeout,
    Canceled,
}

/// Failure raised by an execute callback
///
/// Never escapes the queue: it is classified into a [`TaskResult`] and,
/// for `Error` outcomes, captured on the item.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Failed(#[source] Box<dyn Error + Send + Sync>),

    #[error("execute callback panicked: {0}")]
    Panicked(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Canceled,
}

impl ExecutionError {
    /// Wrap any error (or message) as a failure
    pub fn failed<E>(err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        ExecutionError::Failed(err.into())
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        ExecutionError::Timeout(detail.into())
    }

    /// The outcome this error is reported as
    pub fn result(&self) -> TaskResult {
        match self {
            ExecutionError::Failed(_) | ExecutionError::Panicked(_) => TaskResult::Error,
            ExecutionError::Timeout(_) => TaskResult::Timeout,
            ExecutionError::Canceled => TaskResult::Canceled,
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        ExecutionError::Panicked(panic_message(payload.as_ref()))
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A unit of work submitted to a queue
pub struct WorkItem<T> {
    state: T,
    pub(crate) execute: Option<ExecuteFn<T>>,
    pub(crate) on_result: Option<ResultFn<T>>,
    pub(crate) cleanup: Option<CleanupFn<T>>,
    result: TaskResult,
    error: Option<ExecutionError>,
    token: Option<CancellationToken>,
}

impl<T> WorkItem<T> {
    /// Create an item that uses the queue's callbacks
    pub fn new(state: T) -> Self {
        Self {
            state,
            execute: None,
            on_result: None,
            cleanup: None,
            result: TaskResult::None,
            error: None,
            token: None,
        }
    }

    /// Override the queue's execute callback for this item
    pub fn with_execute<F>(mut self, execute: F) -> Self
    where
        F: Fn(&mut WorkItem<T>) -> Result<(), ExecutionError> + Send + Sync + 'static,
    {
        self.execute = Some(Arc::new(execute));
        self
    }

    /// Override the queue's result callback for this item
    pub fn with_result<F>(mut self, on_result: F) -> Self
    where
        F: Fn(&WorkItem<T>, TaskResult) + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(on_result));
        self
    }

    /// Override the queue's cleanup callback for this item
    pub fn with_cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&mut WorkItem<T>) + Send + Sync + 'static,
    {
        self.cleanup = Some(Arc::new(cleanup));
        self
    }

    pub fn state(&self) -> &T {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut T {
        &mut self.state
    }

    pub fn into_state(self) -> T {
        self.state
    }

    /// Outcome recorded for this item; `None` until it has run
    pub fn result(&self) -> TaskResult {
        self.result
    }

    /// Captured failure, set only for `Error` outcomes
    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    /// Queue cancellation token, attached when execution starts
    pub fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    /// Convenience for cooperative execute callbacks
    pub fn is_cancellation_requested(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) fn attach(&mut self, token: CancellationToken) {
        self.token = Some(token);
    }

    pub(crate) fn record(&mut self, outcome: Result<(), ExecutionError>) -> TaskResult {
        self.result = match outcome {
            Ok(()) => TaskResult::Success,
            Err(err) => {
                let result = err.result();
                if result == TaskResult::Error {
                    self.error = Some(err);
                }
                result
            }
        };
        self.result
    }
}

impl<T: fmt::Debug> fmt::Debug for WorkItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("state", &self.state)
            .field("result", &self.result)
            .field("error", &self.error)
            .field("has_execute", &self.execute.is_some())
            .finish()
    }
}

impl<T> From<T> for WorkItem<T> {
    fn from(state: T) -> Self {
        WorkItem::new(state)
    }
}
