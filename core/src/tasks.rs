//! # Supervised Background Tasks
//!
//! Every background task in this crate — the ledger's debounce driver and
//! price loop, its per-contract event watchers, the tracker's
//! confirmation awaiters — is spawned through a [`TaskSet`] so that its
//! handle is retained and teardown can cancel it explicitly. Fire and
//! forget, but never fire and *lose*: a dangling task from a previous
//! network writing into a freshly reset cache is exactly the bug this
//! type exists to prevent.

use parking_lot::Mutex;
use std::future::Future;
use tokio::task::JoinHandle;

/// An owned set of background task handles.
///
/// Aborting is fire-and-forget cancellation: tasks in this crate hold no
/// cross-await-point locks and perform their cache writes through
/// short synchronous critical sections, so they are safe to abort at any
/// await point.
#[derive(Default)]
pub struct TaskSet {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `future` on the tokio runtime and retains its handle.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut handles = self.handles.lock();
        // Opportunistically drop handles of tasks that already finished,
        // so long-lived sets don't grow without bound.
        handles.retain(|h| !h.is_finished());
        handles.push(tokio::spawn(future));
    }

    /// Aborts every outstanding task and forgets the handles.
    pub fn abort_all(&self) {
        let drained: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in drained {
            handle.abort();
        }
    }

    /// Number of tracked (possibly finished) tasks.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        self.abort_all();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
