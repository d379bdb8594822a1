//! POSIX named semaphores (`sem_open` family)
//!
//! Names are mapped to `/pcq-<kind>-<name>` with path separators
//! replaced, as POSIX allows a single leading slash only. The process that
//! created a semaphore unlinks the name when its handle is dropped.

use std::ffi::CString;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use super::{NamedPrimitives, Opened, PrimitiveKind, Semaphore};

// Linux limits names to NAME_MAX - 4 characters after the leading slash
const MAX_NAME_LEN: usize = 251;

/// Handle to an open POSIX named semaphore
#[derive(Debug)]
pub struct PosixSemaphore {
    name: String,
    os_name: CString,
    handle: *mut libc::sem_t,
    owner: bool,
}

// sem_t operations are thread-safe; the handle is only closed on drop
unsafe impl Send for PosixSemaphore {}
unsafe impl Sync for PosixSemaphore {}

impl PosixSemaphore {
    fn open(kind: PrimitiveKind, name: &str, permits: usize) -> io::Result<Self> {
        let os_name = os_name(kind, name)?;
        let permits = libc::c_uint::try_from(permits).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "permit count out of range")
        })?;

        let mode: libc::c_uint = 0o600;
        let handle = unsafe {
            libc::sem_open(os_name.as_ptr(), libc::O_CREAT | libc::O_EXCL, mode, permits)
        };
        if handle != libc::SEM_FAILED {
            return Ok(Self {
                name: name.to_string(),
                os_name,
                handle,
                owner: true,
            });
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EEXIST) {
            return Err(err);
        }

        let handle = unsafe { libc::sem_open(os_name.as_ptr(), 0) };
        if handle == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            name: name.to_string(),
            os_name,
            handle,
            owner: false,
        })
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

fn os_name(kind: PrimitiveKind, name: &str) -> io::Result<CString> {
    let sanitized: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let full = format!("/pcq-{}-{}", kind, sanitized);
    if full.len() > MAX_NAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("name '{}' is too long for a POSIX semaphore", name),
        ));
    }
    CString::new(full).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

fn deadline_after(timeout: Duration) -> io::Result<libc::timespec> {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let nanos = now.tv_nsec as u64 + u64::from(timeout.subsec_nanos());
    let secs = now.tv_sec as u64 + timeout.as_secs() + nanos / 1_000_000_000;
    Ok(libc::timespec {
        tv_sec: secs as libc::time_t,
        tv_nsec: (nanos % 1_000_000_000) as libc::c_long,
    })
}

impl Semaphore for PosixSemaphore {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn acquire_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let deadline = deadline_after(timeout)?;
        loop {
            if unsafe { libc::sem_timedwait(self.handle, &deadline) } == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ETIMEDOUT) => return Ok(false),
                Some(libc::EINTR) => continue,
                _ => return Err(err),
            }
        }
    }

    fn release(&self) -> io::Result<()> {
        if unsafe { libc::sem_post(self.handle) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for PosixSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.handle);
            if self.owner {
                libc::sem_unlink(self.os_name.as_ptr());
            }
        }
    }
}

/// Provider backed by POSIX named semaphores
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixNamedPrimitives;

impl NamedPrimitives for PosixNamedPrimitives {
    fn open(&self, kind: PrimitiveKind, name: &str, permits: usize) -> io::Result<Opened> {
        let semaphore = PosixSemaphore::open(kind, name, permits)?;
        let owner = semaphore.is_owner();
        log::debug!(
            "Opened POSIX {} '{}' ({})",
            kind,
            name,
            if owner { "created" } else { "attached" }
        );
        Ok(Opened {
            semaphore: Arc::new(semaphore),
            owner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_os_name_mapping() {
        let name = os_name(PrimitiveKind::Mutex, "jobs/nightly").unwrap();
        assert_eq!(name.to_str().unwrap(), "/pcq-mutex-jobs_nightly");

        assert!(os_name(PrimitiveKind::Semaphore, &"x".repeat(300)).is_err());
        assert!(os_name(PrimitiveKind::Semaphore, "nul\0byte").is_err());
    }

    #[test]
    fn test_deadline_normalises_nanoseconds() {
        let deadline = deadline_after(Duration::from_millis(1_999)).unwrap();
        assert!(deadline.tv_nsec < 1_000_000_000);
    }

    #[test]
    #[serial]
    fn test_posix_semaphore_roundtrip() {
        let provider = PosixNamedPrimitives;
        let name = format!("posix-test-{}", std::process::id());
        // Containers without /dev/shm cannot host named semaphores
        let Ok(first) = provider.open_semaphore(&name, 1) else {
            return;
        };
        let second = provider.open_semaphore(&name, 1).unwrap();

        assert!(first.owner);
        assert!(!second.owner);
        assert!(first.semaphore.acquire_timeout(Duration::from_millis(10)).unwrap());
        assert!(!second.semaphore.acquire_timeout(Duration::from_millis(10)).unwrap());
        first.semaphore.release().unwrap();
        assert!(second.semaphore.acquire_timeout(Duration::from_millis(10)).unwrap());
        second.semaphore.release().unwrap();
    }
}
