//! Queue Error Types

use crate::core::error_handling::ContextualError;
use crate::core::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Invalid queue options: {0}")]
    Validation(#[from] ValidationError),

    #[error("Queue '{queue}' is marked complete and accepts no further items")]
    AlreadyCompleted { queue: String },

    #[error("Queue '{queue}' has been disposed")]
    Disposed { queue: String },

    #[error("Queue '{queue}' has been cancelled")]
    Cancelled { queue: String },

    #[error("Named primitive '{name}' could not be opened: {source}")]
    Primitive {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start dispatcher for queue '{queue}': {source}")]
    Spawn {
        queue: String,
        #[source]
        source: std::io::Error,
    },
}

impl ContextualError for QueueError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, QueueError::Validation(_))
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            QueueError::Validation(err) => Some(err.message()),
            _ => None,
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
