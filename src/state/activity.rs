//! Activity tickets and the panel's busy counter
//!
//! Every background operation against a panel holds an [`ActivityTicket`]
//! for as long as it runs. The panel is busy while any ticket is alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Callback receiving busy-state transitions (`true` on 0 -> 1, `false` on 1 -> 0)
pub type BusyObserver = Arc<dyn Fn(bool) + Send + Sync>;

struct ActivityState {
    in_flight: Mutex<usize>,
    idle: Condvar,
    next_ticket: AtomicU64,
    observer: Mutex<Option<BusyObserver>>,
}

impl ActivityState {
    fn finish(&self, ticket: u64) {
        let became_idle = {
            let mut in_flight = self.in_flight.lock();
            debug_assert!(*in_flight > 0, "activity ticket {ticket} released with no activity");
            *in_flight = in_flight.saturating_sub(1);
            *in_flight == 0
        };
        tracing::trace!(ticket, "activity finished");
        if became_idle {
            self.notify(false);
            self.idle.notify_all();
        }
    }

    fn notify(&self, busy: bool) {
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer(busy);
        }
    }
}

/// Thread-safe in-flight operation counter of one panel.
pub struct ActivityTracker {
    state: Arc<ActivityState>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ActivityState {
                in_flight: Mutex::new(0),
                idle: Condvar::new(),
                next_ticket: AtomicU64::new(1),
                observer: Mutex::new(None),
            }),
        }
    }

    /// Register one outstanding operation. The returned ticket ends it when dropped.
    pub fn register_activity(&self) -> ActivityTicket {
        let id = self.state.next_ticket.fetch_add(1, Ordering::Relaxed);
        let became_busy = {
            let mut in_flight = self.state.in_flight.lock();
            *in_flight += 1;
            *in_flight == 1
        };
        tracing::trace!(ticket = id, "activity started");
        if became_busy {
            self.state.notify(true);
        }
        ActivityTicket {
            id,
            panel: Arc::downgrade(&self.state),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight() > 0
    }

    /// Number of tickets currently alive
    pub fn in_flight(&self) -> usize {
        *self.state.in_flight.lock()
    }

    /// Install the observer for busy-state transitions, replacing any previous one
    pub fn set_busy_observer(&self, observer: Option<BusyObserver>) {
        *self.state.observer.lock() = observer;
    }

    /// Block until no activity is in flight. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut in_flight = self.state.in_flight.lock();
        while *in_flight > 0 {
            if self.state.idle.wait_until(&mut in_flight, deadline).timed_out() {
                return *in_flight == 0;
            }
        }
        true
    }
}

/// Scoped marker of one outstanding background operation.
///
/// Move-only. Dropping it (or calling [`ActivityTicket::release`]) ends the
/// activity exactly once; if the panel is already gone this does nothing.
#[derive(Default)]
pub struct ActivityTicket {
    id: u64,
    panel: Weak<ActivityState>,
}

impl ActivityTicket {
    /// Unique identifier, 0 for an inert ticket
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this ticket still counts against a live panel
    pub fn is_active(&self) -> bool {
        self.panel.strong_count() > 0
    }

    /// End the activity now instead of at scope exit
    pub fn release(mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        let panel = std::mem::take(&mut self.panel);
        if let Some(state) = panel.upgrade() {
            state.finish(self.id);
        }
    }
}

impl Drop for ActivityTicket {
    fn drop(&mut self) {
        self.reset();
    }
}

impl std::fmt::Debug for ActivityTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityTicket")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
