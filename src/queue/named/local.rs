//! In-process semaphores and the process-wide name registry

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use super::{NamedPrimitives, Opened, PrimitiveKind, Semaphore};
use crate::core::sync::{handle_mutex_poison, lock_recover};

type Registry = HashMap<(PrimitiveKind, String), Weak<LocalSemaphore>>;

// Entries hold weak handles: a name is released once every opener has
// dropped its handle, like an OS object whose last handle is closed.
static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Counting semaphore built on a mutex and condition variable
#[derive(Debug)]
pub struct LocalSemaphore {
    name: Option<String>,
    available: Mutex<usize>,
    condvar: Condvar,
}

impl LocalSemaphore {
    /// Unnamed semaphore with `permits` permits
    pub fn new(permits: usize) -> Self {
        Self {
            name: None,
            available: Mutex::new(permits),
            condvar: Condvar::new(),
        }
    }

    fn named(name: &str, permits: usize) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new(permits)
        }
    }

    /// Permits currently available
    pub fn available(&self) -> usize {
        *lock_recover(self.available.lock())
    }
}

impl Semaphore for LocalSemaphore {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn acquire_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut available = lock_recover(self.available.lock());
        while *available == 0 {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            available = lock_recover(self.condvar.wait_timeout(available, deadline - now)).0;
        }
        *available -= 1;
        Ok(true)
    }

    fn release(&self) -> io::Result<()> {
        *lock_recover(self.available.lock()) += 1;
        self.condvar.notify_one();
        Ok(())
    }
}

/// Named primitives shared by every queue in this process
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalNamedPrimitives;

impl NamedPrimitives for LocalNamedPrimitives {
    fn open(&self, kind: PrimitiveKind, name: &str, permits: usize) -> io::Result<Opened> {
        let mut registry = handle_mutex_poison(REGISTRY.lock(), |msg| {
            io::Error::new(io::ErrorKind::Other, msg)
        })?;
        registry.retain(|_, weak| weak.strong_count() > 0);

        let key = (kind, name.to_string());
        if let Some(existing) = registry.get(&key).and_then(Weak::upgrade) {
            log::debug!("Attached to existing {} '{}'", kind, name);
            return Ok(Opened {
                semaphore: existing,
                owner: false,
            });
        }

        let created = Arc::new(LocalSemaphore::named(name, permits));
        registry.insert(key, Arc::downgrade(&created));
        log::debug!("Created {} '{}' with {} permit(s)", kind, name, permits);
        Ok(Opened {
            semaphore: created,
            owner: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_local_semaphore_counts_permits() {
        let semaphore = LocalSemaphore::new(2);
        assert!(semaphore.acquire_timeout(Duration::ZERO).unwrap());
        assert!(semaphore.acquire_timeout(Duration::ZERO).unwrap());
        assert!(!semaphore.acquire_timeout(Duration::from_millis(5)).unwrap());
        assert_eq!(semaphore.available(), 0);

        semaphore.release().unwrap();
        assert_eq!(semaphore.available(), 1);
    }

    #[test]
    fn test_release_wakes_waiter() {
        let semaphore = Arc::new(LocalSemaphore::new(0));
        let remote = Arc::clone(&semaphore);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.release().unwrap();
        });

        assert!(semaphore.acquire_timeout(Duration::from_secs(5)).unwrap());
        handle.join().unwrap();
    }

    #[test]
    fn test_registry_ownership() {
        let provider = LocalNamedPrimitives;
        let first = provider.open_semaphore("local-registry-ownership", 2).unwrap();
        let second = provider.open_semaphore("local-registry-ownership", 5).unwrap();

        assert!(first.owner);
        assert!(!second.owner);
        assert_eq!(first.semaphore.name(), Some("local-registry-ownership"));

        // Both handles share the permits of the creator
        assert!(second.semaphore.acquire_timeout(Duration::ZERO).unwrap());
        assert!(first.semaphore.acquire_timeout(Duration::ZERO).unwrap());
        assert!(!first.semaphore.acquire_timeout(Duration::ZERO).unwrap());
    }

    #[test]
    fn test_name_released_after_last_handle() {
        let provider = LocalNamedPrimitives;
        let opened = provider.open_mutex("local-registry-release").unwrap();
        assert!(opened.owner);
        drop(opened);

        let reopened = provider.open_mutex("local-registry-release").unwrap();
        assert!(reopened.owner);
    }
}
