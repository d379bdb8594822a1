//! Cooperative cancellation
//!
//! A cloneable, thread-safe cancellation signal shared between a queue, its
//! dispatchers and the items it runs. Cancellation is one-way: once
//! triggered a token never resets. Blocking waits (`wait_timeout`) and
//! async waits (`cancelled`) are both supported, and child tokens created
//! with [`CancellationToken::child_token`] are cancelled together with
//! their parent (but not the other way round).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::core::sync::lock_recover;

struct TokenState {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
    notify: Notify,
    children: Mutex<Vec<Weak<TokenState>>>,
}

impl TokenState {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        // Take the wait lock so a waiter between its flag check and its
        // condvar wait cannot miss the wakeup.
        drop(lock_recover(self.lock.lock()));
        self.condvar.notify_all();
        self.notify.notify_waiters();

        let children = std::mem::take(&mut *lock_recover(self.children.lock()));
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Shared cooperative cancellation signal
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Create a new, untriggered token
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState::new()),
        }
    }

    /// Create a token that is cancelled whenever this token is cancelled
    ///
    /// Cancelling the child does not affect the parent.
    pub fn child_token(&self) -> Self {
        let child = Self::new();
        let mut children = lock_recover(self.state.children.lock());
        if self.state.is_cancelled() {
            drop(children);
            child.cancel();
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.state));
        }
        child
    }

    /// Trigger cancellation; idempotent
    pub fn cancel(&self) {
        self.state.cancel();
    }

    /// Check whether cancellation has been triggered
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Block the calling thread until cancelled or the timeout elapses
    ///
    /// Returns `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = lock_recover(self.state.lock.lock());
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = lock_recover(self.state.condvar.wait_timeout(guard, deadline - now)).0;
        }
    }

    /// Resolve once the token has been cancelled
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
