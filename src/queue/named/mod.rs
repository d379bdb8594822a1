//! Named synchronisation primitives
//!
//! Strategies that can coordinate across processes (semaphore-gated and
//! named-mutex) acquire their primitive through a [`NamedPrimitives`]
//! provider. Two providers ship with the crate:
//!
//! - [`LocalNamedPrimitives`]: a process-wide registry; every queue in the
//!   process opening the same name shares one primitive.
//! - `PosixNamedPrimitives` (Linux only): POSIX named semaphores, shared
//!   between processes. Opt-in through the options builder.
//!
//! A named mutex is modelled as a binary semaphore living in its own name
//! space, so a mutex and a semaphore with the same name never collide.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

mod local;
#[cfg(target_os = "linux")]
mod posix;

pub use local::{LocalNamedPrimitives, LocalSemaphore};
#[cfg(target_os = "linux")]
pub use posix::{PosixNamedPrimitives, PosixSemaphore};

/// Kind of named primitive requested from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PrimitiveKind {
    Semaphore,
    Mutex,
}

/// A counting semaphore, possibly shared across processes
pub trait Semaphore: Send + Sync + fmt::Debug {
    /// Name the primitive was opened with, if any
    fn name(&self) -> Option<&str>;

    /// Take one permit, waiting at most `timeout`
    ///
    /// Returns `Ok(false)` when the timeout elapsed without a permit.
    fn acquire_timeout(&self, timeout: Duration) -> io::Result<bool>;

    /// Return one permit
    fn release(&self) -> io::Result<()>;
}

/// Result of opening a named primitive
#[derive(Debug, Clone)]
pub struct Opened {
    pub semaphore: Arc<dyn Semaphore>,
    /// `true` if this call created the primitive, `false` if it attached to
    /// an existing one. Informational only.
    pub owner: bool,
}

/// Capability to open (or create) primitives by name
pub trait NamedPrimitives: Send + Sync + fmt::Debug {
    /// Open the primitive `name` of `kind`, creating it with `permits`
    /// permits if it does not exist yet
    fn open(&self, kind: PrimitiveKind, name: &str, permits: usize) -> io::Result<Opened>;

    fn open_semaphore(&self, name: &str, permits: usize) -> io::Result<Opened> {
        self.open(PrimitiveKind::Semaphore, name, permits)
    }

    fn open_mutex(&self, name: &str) -> io::Result<Opened> {
        self.open(PrimitiveKind::Mutex, name, 1)
    }
}

/// Provider used when options do not name one
///
/// Cross-process coordination is opt-in: pass `PosixNamedPrimitives` to
/// the options builder to share primitives between processes.
pub fn default_primitives() -> Arc<dyn NamedPrimitives> {
    Arc::new(LocalNamedPrimitives)
}

/// A held permit, returned to its semaphore on drop
#[derive(Debug)]
pub struct Permit {
    semaphore: Arc<dyn Semaphore>,
}

impl Permit {
    /// Take a permit, waiting at most `timeout`
    pub fn acquire(semaphore: &Arc<dyn Semaphore>, timeout: Duration) -> io::Result<Option<Permit>> {
        if semaphore.acquire_timeout(timeout)? {
            Ok(Some(Permit {
                semaphore: Arc::clone(semaphore),
            }))
        } else {
            Ok(None)
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Err(e) = self.semaphore.release() {
            log::warn!(
                "Failed to release permit on {:?}: {}",
                self.semaphore.name().unwrap_or("<unnamed>"),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_released_on_drop() {
        let semaphore: Arc<dyn Semaphore> = Arc::new(LocalSemaphore::new(1));

        let permit = Permit::acquire(&semaphore, Duration::from_millis(10)).unwrap();
        assert!(permit.is_some());
        assert!(Permit::acquire(&semaphore, Duration::from_millis(10))
            .unwrap()
            .is_none());

        drop(permit);
        assert!(Permit::acquire(&semaphore, Duration::from_millis(10))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_mutex_and_semaphore_names_do_not_collide() {
        let provider = LocalNamedPrimitives;
        let semaphore = provider.open_semaphore("named-mod-collision", 3).unwrap();
        let mutex = provider.open_mutex("named-mod-collision").unwrap();

        assert!(semaphore.owner);
        assert!(mutex.owner);
        assert!(mutex.semaphore.acquire_timeout(Duration::from_millis(10)).unwrap());
        assert!(!mutex.semaphore.acquire_timeout(Duration::from_millis(10)).unwrap());
        // The semaphore still has all three permits
        for _ in 0..3 {
            assert!(semaphore.semaphore.acquire_timeout(Duration::from_millis(10)).unwrap());
        }
    }
}
