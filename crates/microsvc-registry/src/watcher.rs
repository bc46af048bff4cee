//! Watcher contract (§4.4): a finite, cancellable stream of [`Event`]s with
//! a bounded queue, oldest-drop backpressure, and a resync marker.

use super::types::Event;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// One item delivered by [`Watcher::next`].
#[derive(Debug, Clone)]
pub enum WatchItem {
    /// A registry change.
    Event(Event),
    /// The queue overflowed and the oldest event(s) were dropped; the
    /// caller should treat its view as possibly stale and resync via
    /// `getService`/`listServices`.
    Resync,
}

/// Terminal value returned by [`Watcher::next`] after [`Watcher::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped;

struct Inner {
    queue: parking_lot::Mutex<VecDeque<WatchItem>>,
    capacity: usize,
    notify: Notify,
    stopped: AtomicBool,
    filter: Option<String>,
}

/// A cancellable, independently-progressing subscription to registry
/// [`Event`]s, optionally scoped to one service name.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<Inner>,
}

impl Watcher {
    pub fn new(filter: Option<String>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: parking_lot::Mutex::new(VecDeque::new()),
                capacity: capacity.max(1),
                notify: Notify::new(),
                stopped: AtomicBool::new(false),
                filter,
            }),
        }
    }

    /// Whether `service_name` falls within this watcher's scope.
    pub fn matches(&self, service_name: &str) -> bool {
        match &self.inner.filter {
            Some(name) => name == service_name,
            None => true,
        }
    }

    /// Deliver an event, dropping the oldest queued item and emitting a
    /// resync marker on overflow (§4.4 backpressure).
    pub fn push(&self, event: Event) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }
        let mut queue = self.inner.queue.lock();
        if queue.len() >= self.inner.capacity {
            queue.pop_front();
            queue.push_back(WatchItem::Resync);
        } else {
            queue.push_back(WatchItem::Event(event));
        }
        drop(queue);
        self.inner.notify.notify_one();
    }

    /// Block until an event arrives or the watcher is stopped.
    pub async fn next(&self) -> Result<WatchItem, Stopped> {
        loop {
            {
                let mut queue = self.inner.queue.lock();
                if let Some(item) = queue.pop_front() {
                    return Ok(item);
                }
            }
            if self.inner.stopped.load(Ordering::SeqCst) {
                return Err(Stopped);
            }
            self.inner.notify.notified().await;
            if self.inner.stopped.load(Ordering::SeqCst) {
                let mut queue = self.inner.queue.lock();
                if let Some(item) = queue.pop_front() {
                    return Ok(item);
                }
                return Err(Stopped);
            }
        }
    }

    /// Cancel the watcher. Independent of any other watcher on the same
    /// registry; subsequent `next()` calls return [`Stopped`] once the
    /// queue drains.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventKind, Service};

    fn event() -> Event {
        Event::new(EventKind::Create, Service::new("users", "1.0.0", vec![]), 0)
    }

    #[tokio::test]
    async fn push_then_next_delivers_the_event() {
        let watcher = Watcher::new(None, 4);
        watcher.push(event());
        match watcher.next().await.unwrap() {
            WatchItem::Event(e) => assert_eq!(e.service.name, "users"),
            WatchItem::Resync => panic!("expected event"),
        }
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_emits_resync() {
        let watcher = Watcher::new(None, 2);
        watcher.push(event());
        watcher.push(event());
        watcher.push(event()); // overflow

        let first = watcher.next().await.unwrap();
        assert!(matches!(first, WatchItem::Event(_)));
        let second = watcher.next().await.unwrap();
        assert!(matches!(second, WatchItem::Resync));
    }

    #[tokio::test]
    async fn stop_then_next_returns_terminal_marker() {
        let watcher = Watcher::new(None, 4);
        watcher.stop();
        assert!(watcher.next().await.is_err());
    }

    #[tokio::test]
    async fn queued_events_still_drain_after_stop() {
        let watcher = Watcher::new(None, 4);
        watcher.push(event());
        watcher.stop();
        assert!(watcher.next().await.is_ok());
        assert!(watcher.next().await.is_err());
    }

    #[test]
    fn filter_scopes_matches() {
        let scoped = Watcher::new(Some("users".to_string()), 4);
        assert!(scoped.matches("users"));
        assert!(!scoped.matches("orders"));
        let unscoped = Watcher::new(None, 4);
        assert!(unscoped.matches("anything"));
    }
}
