//! Signal-driven shutdown
//!
//! Bridges process signals to a [`CancellationToken`]: the first
//! interrupt/terminate signal cancels the token so running queues stop
//! picking up work; a second signal exits immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::cancel::CancellationToken;

/// Install signal handlers that cancel `token`
///
/// Must be called from within a tokio runtime.
pub fn install_signal_handlers(token: CancellationToken) {
    let signal_count = Arc::new(AtomicUsize::new(0));

    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        use tokio::signal::unix::{signal, SignalKind};
        let signals = [
            SignalKind::interrupt(),
            SignalKind::terminate(),
            SignalKind::hangup(),
        ];

        for kind in signals {
            let token = token.clone();
            let counter = signal_count.clone();
            tokio::spawn(async move {
                if let Ok(mut sig) = signal(kind) {
                    while sig.recv().await.is_some() {
                        on_signal(&token, &counter);
                    }
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                on_signal(&token, &signal_count);
            }
        });
    }
}

fn on_signal(token: &CancellationToken, counter: &AtomicUsize) {
    let prev = counter.fetch_add(1, Ordering::AcqRel);
    if prev >= 1 {
        log::warn!("Second interrupt received; exiting");
        std::process::exit(130);
    }
    log::warn!("Interrupt received; cancelling outstanding work (repeat to force exit)");
    token.cancel();
}
