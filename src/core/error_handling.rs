//! Generic error handling utilities
//!
//! Lets the binary report any error type with the right amount of detail:
//! user-actionable errors (bad options, bad config) print their own
//! message, system errors print the operation context and leave the
//! details to debug logging.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` should
/// return `Some(message)`; otherwise it should return `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message the user can act on
    /// directly (invalid thread count, malformed config value)
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<&str>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// # Examples
/// ```rust,no_run
/// # use pcq::core::error_handling::log_error_with_context;
/// # use pcq::core::validation::ValidationError;
/// let err = ValidationError::new("threads must be between 1 and 8 (got 9)");
/// log_error_with_context(&err, "Queue construction");
/// // Logs: "FATAL: threads must be between 1 and 8 (got 9)"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
