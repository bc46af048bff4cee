//! Background task tracker (§5 "Fiber/task tracker"), **[EXPANSION]**
//! grounded in the `tokio::sync::RwLock`-guarded background-task bookkeeping
//! used throughout `mofa-runtime`: broker receive loops and registry TTL
//! sweeps are named when spawned so shutdown can cancel and await them
//! within a deadline instead of abandoning them.

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::warn;

struct Tracked {
    name: String,
    handle: JoinHandle<()>,
}

/// Named collection of background tasks spawned off the current runtime.
/// Not `Clone`: one tracker owns the tasks it spawned, and `shutdown`
/// consumes it.
#[derive(Default)]
pub struct TaskTracker {
    tasks: parking_lot::Mutex<Vec<Tracked>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` as a named background task.
    pub fn spawn(&self, name: impl Into<String>, future: impl Future<Output = ()> + Send + 'static) {
        let handle = tokio::spawn(future);
        self.tasks.lock().push(Tracked { name: name.into(), handle });
    }

    /// Abort every tracked task and await each within `deadline`, logging
    /// (rather than failing) any that don't finish in time.
    pub async fn shutdown(&self, deadline: std::time::Duration) {
        let tasks: Vec<Tracked> = self.tasks.lock().drain(..).collect();
        for tracked in tasks {
            tracked.handle.abort();
            match tokio::time::timeout(deadline, tracked.handle).await {
                Ok(_) => {}
                Err(_) => warn!(task = %tracked.name, "background task did not join within shutdown deadline"),
            }
        }
    }

    /// Number of tasks currently tracked (including finished-but-not-yet-
    /// reaped ones).
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
