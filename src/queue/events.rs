//! Queue lifecycle notifications
//!
//! Two events are published per queue, each at most once:
//! `WorkStarted` right before the first item executes and `WorkCompleted`
//! once the queue has been marked complete and every dispatcher has
//! finished. Listeners either register a callback or subscribe to a
//! broadcast channel.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio::sync::broadcast;

use crate::core::sync::lock_recover;
use crate::queue::item::panic_message;

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum QueueEventKind {
    WorkStarted,
    WorkCompleted,
}

#[derive(Clone, Debug)]
pub struct QueueEvent {
    pub kind: QueueEventKind,
    pub timestamp: SystemTime,
    pub queue: String,
    /// Items still counted by the queue when the event fired
    pub count: usize,
}

impl QueueEvent {
    pub fn new(kind: QueueEventKind, queue: String, timestamp: SystemTime, count: usize) -> Self {
        Self {
            kind,
            timestamp,
            queue,
            count,
        }
    }
}

/// Callback invoked for queue events
pub type EventHandler = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

/// Subscriber list plus broadcast channel for one queue
pub(crate) struct QueueEvents {
    handlers: Mutex<Vec<(QueueEventKind, EventHandler)>>,
    sender: broadcast::Sender<QueueEvent>,
}

impl QueueEvents {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            handlers: Mutex::new(Vec::new()),
            sender,
        }
    }

    pub(crate) fn on(&self, kind: QueueEventKind, handler: EventHandler) {
        lock_recover(self.handlers.lock()).push((kind, handler));
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    /// Deliver `event` to matching handlers and broadcast subscribers
    ///
    /// Handlers run on the publishing thread, outside the handler lock, so
    /// a handler may register further handlers. A panicking handler is
    /// logged and does not affect the others.
    pub(crate) fn publish(&self, event: QueueEvent) {
        let handlers: Vec<EventHandler> = lock_recover(self.handlers.lock())
            .iter()
            .filter(|(kind, _)| *kind == event.kind)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                log::warn!(
                    "{}: {} handler panicked: {}",
                    event.queue,
                    event.kind,
                    panic_message(payload.as_ref())
                );
            }
        }

        // No receivers is not an error
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(kind: QueueEventKind) -> QueueEvent {
        QueueEvent::new(kind, "test-queue".to_string(), SystemTime::now(), 0)
    }

    #[test]
    fn test_handlers_filtered_by_kind() {
        let events = QueueEvents::new();
        let started = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&started);
        events.on(
            QueueEventKind::WorkStarted,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = Arc::clone(&completed);
        events.on(
            QueueEventKind::WorkCompleted,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        events.publish(event(QueueEventKind::WorkStarted));

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let events = QueueEvents::new();
        let calls = Arc::new(AtomicUsize::new(0));

        events.on(QueueEventKind::WorkCompleted, Arc::new(|_| panic!("listener bug")));
        let counter = Arc::clone(&calls);
        events.on(
            QueueEventKind::WorkCompleted,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        events.publish(event(QueueEventKind::WorkCompleted));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broadcast_subscribers_receive_events() {
        let events = QueueEvents::new();
        let mut rx1 = events.subscribe();
        let mut rx2 = events.subscribe();

        events.publish(event(QueueEventKind::WorkCompleted));

        assert_eq!(rx1.recv().await.unwrap().kind, QueueEventKind::WorkCompleted);
        assert_eq!(rx2.recv().await.unwrap().queue, "test-queue");
    }
}
