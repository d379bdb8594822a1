//! Synchronization utilities for robust lock handling
//!
//! Two policies are offered for poisoned locks. Containers whose contents
//! stay valid after a panic (pending queues, counters, registries of weak
//! handles) recover the guard with [`lock_recover`]; callers that must
//! report the poisoning convert it with [`handle_mutex_poison`].

use std::sync::{LockResult, PoisonError};

/// Recover the guard from a possibly poisoned lock result
///
/// Works for `lock()`, `read()`, `write()` and condvar waits alike, since
/// all of them return a `LockResult`.
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use pcq::core::sync::lock_recover;
///
/// let mutex = Mutex::new(42);
/// let guard = lock_recover(mutex.lock());
/// assert_eq!(*guard, 42);
/// ```
pub fn lock_recover<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}

/// Handle poisoned mutex cases with consistent error handling
///
/// Converts a poison error into an application-specific error using the
/// provided constructor.
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use pcq::core::sync::handle_mutex_poison;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |msg| {
///     std::io::Error::new(std::io::ErrorKind::Other, msg)
/// })
/// .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). This indicates a panic occurred while holding a lock. PoisonError: {:?}",
            poison_err
        ))
    })
}
