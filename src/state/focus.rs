//! Delayed focusing: "put the cursor on this entry once it shows up"
//!
//! A panel keeps at most one such request. It is re-checked whenever the
//! listing contents change, dropped on directory change, dropped once
//! fulfilled and dropped silently when its deadline passes.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::panel::PanelData;

/// Hook run after a delayed focus request succeeded
pub type FocusDone = Box<dyn FnOnce() + Send>;

/// A deferred request to focus an entry by name
pub struct DelayedFocusing {
    pub filename: String,
    pub timeout: Duration,
    /// Try to match against the current listing right away
    pub check_now: bool,
    pub done: Option<FocusDone>,
}

impl DelayedFocusing {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
            check_now: true,
            done: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn check_now(mut self, check_now: bool) -> Self {
        self.check_now = check_now;
        self
    }

    pub fn on_done(mut self, done: impl FnOnce() + Send + 'static) -> Self {
        self.done = Some(Box::new(done));
        self
    }
}

impl std::fmt::Debug for DelayedFocusing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedFocusing")
            .field("filename", &self.filename)
            .field("timeout", &self.timeout)
            .field("check_now", &self.check_now)
            .field("done", &self.done.is_some())
            .finish()
    }
}

struct PendingFocus {
    filename: String,
    deadline: Instant,
    done: Option<FocusDone>,
}

/// Holds the single pending [`DelayedFocusing`] of a panel.
///
/// Matching needs the panel data, which callers pass in while holding the
/// panel lock. Hooks are handed back instead of called, so the caller can
/// run them once every lock is released.
#[derive(Default)]
pub struct DelayedFocusScheduler {
    pending: Mutex<Option<PendingFocus>>,
}

/// Focus `filename` if it is displayed, dropping any other selection first
fn try_focus(data: &mut PanelData, filename: &str) -> bool {
    if data.display_index_of(filename).is_none() {
        return false;
    }
    data.clear_selection();
    data.focus_name(filename)
}

impl DelayedFocusScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending request with `request`.
    ///
    /// Returns the request's hook if it was fulfilled immediately.
    pub fn schedule(&self, request: DelayedFocusing, data: &mut PanelData) -> Option<FocusDone> {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            tracing::trace!(filename = %previous.filename, "delayed focus superseded");
        }

        if request.check_now && try_focus(data, &request.filename) {
            tracing::debug!(filename = %request.filename, "delayed focus matched immediately");
            return request.done;
        }

        *pending = Some(PendingFocus {
            filename: request.filename,
            deadline: Instant::now() + request.timeout,
            done: request.done,
        });
        None
    }

    /// Re-check the pending request against changed listing contents.
    ///
    /// Returns the hook of a request fulfilled by this update.
    pub fn on_listing_updated(&self, data: &mut PanelData) -> Option<FocusDone> {
        let mut pending = self.pending.lock();
        let request = pending.as_ref()?;

        if Instant::now() >= request.deadline {
            tracing::debug!(filename = %request.filename, "delayed focus expired");
            *pending = None;
            return None;
        }
        if !try_focus(data, &request.filename) {
            return None;
        }

        let request = pending.take()?;
        tracing::debug!(filename = %request.filename, "delayed focus matched");
        request.done
    }

    /// Drop the pending request without running its hook
    pub fn on_directory_changed(&self) {
        if let Some(request) = self.pending.lock().take() {
            tracing::trace!(filename = %request.filename, "delayed focus dropped on directory change");
        }
    }

    /// Whether a request is waiting; an expired one is dropped here
    pub fn is_pending(&self) -> bool {
        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|p| Instant::now() >= p.deadline) {
            *pending = None;
        }
        pending.is_some()
    }

    /// Name the pending request waits for
    pub fn pending_filename(&self) -> Option<String> {
        if !self.is_pending() {
            return None;
        }
        self.pending.lock().as_ref().map(|p| p.filename.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileEntry;
    use crate::providers::{MemoryProvider, ProviderHandle};
    use crate::state::panel::Listing;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn data_with(names: &[&str]) -> PanelData {
        let mut data = PanelData::new();
        data.load(listing(names));
        data
    }

    fn listing(names: &[&str]) -> Arc<Listing> {
        let provider: ProviderHandle = Arc::new(MemoryProvider::new("t"));
        let entries = names
            .iter()
            .map(|name| FileEntry::virtual_entry(format!("/{}", name), name, false, 1))
            .collect();
        Arc::new(Listing::uniform("/".to_string(), provider, entries))
    }

    fn counting_hook(counter: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_check_now_matches_existing_entry() {
        let scheduler = DelayedFocusScheduler::new();
        let mut data = data_with(&["a.txt", "report.txt"]);
        let calls = Arc::new(AtomicUsize::new(0));

        let hook = scheduler.schedule(
            DelayedFocusing::new("report.txt").on_done(counting_hook(&calls)),
            &mut data,
        );
        hook.expect("fulfilled immediately")();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(data.focused_name(), Some("report.txt"));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_match_deselects_everything_else() {
        let scheduler = DelayedFocusScheduler::new();
        let mut data = data_with(&["a", "b", "c"]);
        data.select_entries_with_names(&["a".to_string(), "b".to_string()]);

        scheduler.schedule(DelayedFocusing::new("c"), &mut data);
        assert_eq!(data.selected_count(), 0);
        assert_eq!(data.focused_name(), Some("c"));
    }

    #[test]
    fn test_entry_appearing_later() {
        let scheduler = DelayedFocusScheduler::new();
        let mut data = data_with(&["a.txt"]);
        let calls = Arc::new(AtomicUsize::new(0));

        let hook = scheduler.schedule(
            DelayedFocusing::new("new.txt").check_now(false).on_done(counting_hook(&calls)),
            &mut data,
        );
        assert!(hook.is_none());
        assert!(scheduler.on_listing_updated(&mut data).is_none());
        assert!(scheduler.is_pending());

        data.reload(listing(&["a.txt", "new.txt"]));
        scheduler.on_listing_updated(&mut data).expect("matched")();
        assert!(scheduler.on_listing_updated(&mut data).is_none());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(data.focused_name(), Some("new.txt"));
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_check_now_false_waits_for_update_even_if_present() {
        let scheduler = DelayedFocusScheduler::new();
        let mut data = data_with(&["a", "b"]);
        assert!(scheduler.schedule(DelayedFocusing::new("b").check_now(false), &mut data).is_none());
        assert_eq!(data.focused_name(), Some("a"));
        assert!(scheduler.is_pending());
    }

    #[test]
    fn test_expires_without_hook() {
        let scheduler = DelayedFocusScheduler::new();
        let mut data = data_with(&["a"]);
        let calls = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(
            DelayedFocusing::new("never")
                .timeout(Duration::from_millis(10))
                .on_done(counting_hook(&calls)),
            &mut data,
        );
        thread::sleep(Duration::from_millis(30));

        data.reload(listing(&["a", "never"]));
        assert!(scheduler.on_listing_updated(&mut data).is_none());
        assert!(!scheduler.is_pending());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(data.focused_name(), Some("a"));
    }

    #[test]
    fn test_is_pending_drops_expired_request() {
        let scheduler = DelayedFocusScheduler::new();
        let mut data = data_with(&[]);
        scheduler.schedule(DelayedFocusing::new("x").timeout(Duration::from_millis(5)), &mut data);
        assert_eq!(scheduler.pending_filename().as_deref(), Some("x"));
        thread::sleep(Duration::from_millis(20));
        assert!(!scheduler.is_pending());
        assert!(scheduler.pending_filename().is_none());
    }

    #[test]
    fn test_directory_change_clears() {
        let scheduler = DelayedFocusScheduler::new();
        let mut data = data_with(&["a"]);
        let calls = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(
            DelayedFocusing::new("later").timeout(Duration::from_secs(60)).on_done(counting_hook(&calls)),
            &mut data,
        );

        scheduler.on_directory_changed();
        assert!(!scheduler.is_pending());

        data.reload(listing(&["a", "later"]));
        assert!(scheduler.on_listing_updated(&mut data).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_new_request_supersedes_old() {
        let scheduler = DelayedFocusScheduler::new();
        let mut data = data_with(&["a"]);
        let first = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(DelayedFocusing::new("one").on_done(counting_hook(&first)), &mut data);
        scheduler.schedule(DelayedFocusing::new("two"), &mut data);
        assert_eq!(scheduler.pending_filename().as_deref(), Some("two"));

        data.reload(listing(&["a", "one", "two"]));
        scheduler.on_listing_updated(&mut data);
        assert_eq!(data.focused_name(), Some("two"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
    }
}
