//! Strategy selection

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::cancel::CancellationToken;
use crate::queue::core::{QueueCore, Strategy};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::options::QueueOptions;
use crate::queue::strategy::{BatchGroup, Monitor, NamedMutex, Pipeline, SemaphoreGated, WorkerPool};

/// Concurrency strategy of a queue
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum QueueMode {
    /// N long-lived workers polling a shared FIFO
    #[default]
    WorkerPool,
    /// One dispatcher, one thread per item, N permits
    Semaphore,
    /// N workers blocking on a condition variable
    WaitAndPulse,
    /// Unbounded buffer feeding N processors
    Pipeline,
    /// Batches of N items, each awaited in full
    TaskGroup,
    /// Batches of up to N items, flushed after the threshold
    ThresholdTaskGroup,
    /// One thread per item, serialised by a named mutex
    Mutex,
}

impl QueueMode {
    /// Modes that open a named primitive when the queue has a name
    pub fn uses_named_primitive(self) -> bool {
        matches!(self, QueueMode::Semaphore | QueueMode::Mutex)
    }
}

/// Build the engine for `mode`
///
/// The queue runs on a child of `token`: cancelling `token` stops the
/// queue, stopping the queue leaves `token` untouched.
pub(crate) fn build<T: Send + 'static>(
    mode: QueueMode,
    options: QueueOptions<T>,
    token: &CancellationToken,
) -> QueueResult<Arc<QueueCore<T>>> {
    let label = options.name().map(str::to_string).unwrap_or_else(|| mode.to_string());
    if token.is_cancelled() {
        return Err(QueueError::Cancelled { queue: label });
    }

    let strategy: Box<dyn Strategy<T>> = match mode {
        QueueMode::WorkerPool => Box::new(WorkerPool::new()),
        QueueMode::Semaphore => Box::new(SemaphoreGated::new(&options)?),
        QueueMode::WaitAndPulse => Box::new(Monitor::new()),
        QueueMode::Pipeline => Box::new(Pipeline::new(options.threads())),
        QueueMode::TaskGroup => Box::new(BatchGroup::new(None)),
        QueueMode::ThresholdTaskGroup => Box::new(BatchGroup::new(options.threshold())),
        QueueMode::Mutex => Box::new(NamedMutex::new(&options)?),
    };

    log::debug!(
        "{}: created {} queue with {} thread(s)",
        label,
        mode,
        options.threads()
    );
    Ok(QueueCore::new(mode, options, token.child_token(), strategy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_mode_names_round_trip() {
        for mode in QueueMode::iter() {
            assert_eq!(QueueMode::from_str(&mode.to_string()).unwrap(), mode);
        }
        assert_eq!(QueueMode::from_str("Threshold-Task-Group").unwrap(), QueueMode::ThresholdTaskGroup);
        assert_eq!(QueueMode::WaitAndPulse.to_string(), "wait-and-pulse");
        assert!(QueueMode::from_str("blocking-collection").is_err());
    }

    #[test]
    fn test_named_primitive_modes() {
        let named: Vec<_> = QueueMode::iter().filter(|m| m.uses_named_primitive()).collect();
        assert_eq!(named, vec![QueueMode::Semaphore, QueueMode::Mutex]);
    }

    #[test]
    fn test_build_refuses_cancelled_token() {
        let options = QueueOptions::<u32>::builder()
            .threads(1)
            .execute(|_| Ok(()))
            .build()
            .unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = build(QueueMode::WorkerPool, options, &token).unwrap_err();
        assert!(matches!(err, QueueError::Cancelled { .. }));
    }
}
