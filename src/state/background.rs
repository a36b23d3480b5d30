//! Background task handling with cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::Mutex;

/// Cancellation flag shared between the context that issued a task and the
/// context running it. Cancellation is cooperative: the task polls the flag
/// at safe points and nothing is ever forcibly stopped.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same flag
    pub fn same_as(&self, other: &CancelFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn downgrade(&self) -> Weak<AtomicBool> {
        Arc::downgrade(&self.0)
    }
}

/// Runs units of work either inline or on a background thread, handing each
/// one a live cancellation flag.
///
/// Every call starts independent work; there is no queue. Callers that need
/// ordering (navigation) impose it themselves.
pub struct CancelableTaskRunner {
    /// Flags of asynchronous tasks that may still be running
    live: Mutex<Vec<Weak<AtomicBool>>>,
    /// Set once `cancel_all` ran; later tasks start out cancelled
    shut_down: AtomicBool,
}

impl Default for CancelableTaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelableTaskRunner {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Run `task` with a fresh cancellation flag and return that flag.
    ///
    /// A synchronous task runs on the calling thread and its flag is never
    /// set by the runner: synchronous work cannot be preempted. An
    /// asynchronous task runs on its own thread and its flag is set by
    /// `cancel_all` or by whoever holds the returned handle.
    pub fn run<F>(&self, task: F, synchronous: bool) -> CancelFlag
    where
        F: FnOnce(&CancelFlag) + Send + 'static,
    {
        let cancel = CancelFlag::new();

        if synchronous {
            task(&cancel);
            return cancel;
        }

        if self.shut_down.load(Ordering::Acquire) {
            cancel.cancel();
        } else {
            let mut live = self.live.lock();
            live.retain(|flag| flag.strong_count() > 0);
            live.push(cancel.downgrade());
        }

        let task_cancel = cancel.clone();
        thread::spawn(move || task(&task_cancel));

        cancel
    }

    /// Cancel every asynchronous task still running, and every one started
    /// from now on. Used at panel teardown.
    pub fn cancel_all(&self) {
        self.shut_down.store(true, Ordering::Release);
        let live = std::mem::take(&mut *self.live.lock());
        for flag in live.iter().filter_map(Weak::upgrade) {
            flag.store(true, Ordering::Release);
        }
        tracing::debug!(tasks = live.len(), "cancelled background tasks");
    }
}
