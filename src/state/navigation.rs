//! Directory change requests and the navigation state machine bookkeeping
//!
//! Every navigation gets a generation number. Starting a new one cancels the
//! flag of the previous one and bumps the generation, so a late result of an
//! older request is recognised and dropped when it tries to apply.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::ResultCode;
use crate::providers::ProviderHandle;
use super::background::CancelFlag;

/// Completion callback of a navigation. Runs exactly once, on whichever
/// thread performed the load.
pub type LoadingCallback = Box<dyn FnOnce(ResultCode) + Send>;

/// Where the result code of a request is stored for the caller to inspect
#[derive(Clone, Debug, Default)]
pub struct ResultSlot(Arc<Mutex<Option<ResultCode>>>);

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the request completed
    pub fn get(&self) -> Option<ResultCode> {
        *self.0.lock()
    }

    pub(crate) fn set(&self, code: ResultCode) {
        *self.0.lock() = Some(code);
    }
}

/// One navigation intent
pub struct DirectoryChangeRequest {
    /// Directory to show
    pub directory: String,
    /// Provider the directory lives on
    pub provider: ProviderHandle,
    /// Entry to put the cursor on after loading
    pub focused_entry: Option<String>,
    /// Load on a background thread (default) or on the calling thread
    pub asynchronous: bool,
    /// Restore the focus remembered for this location when no entry is given
    pub load_previous_view_state: bool,
    /// Called once with the outcome
    pub on_loaded: Option<LoadingCallback>,
    /// Outcome, readable once the request completed
    pub result: ResultSlot,
    /// Re-fetch of the displayed directory rather than a directory change
    pub(crate) refresh: bool,
    /// History position this request browses to (back/forward)
    pub(crate) history_index: Option<usize>,
}

impl std::fmt::Debug for DirectoryChangeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryChangeRequest")
            .field("directory", &self.directory)
            .field("provider", &self.provider.info().name)
            .field("focused_entry", &self.focused_entry)
            .field("asynchronous", &self.asynchronous)
            .field("load_previous_view_state", &self.load_previous_view_state)
            .field("refresh", &self.refresh)
            .field("history_index", &self.history_index)
            .finish()
    }
}

impl DirectoryChangeRequest {
    pub fn new(directory: &str, provider: ProviderHandle) -> Self {
        Self {
            directory: directory.to_string(),
            provider,
            focused_entry: None,
            asynchronous: true,
            load_previous_view_state: false,
            on_loaded: None,
            result: ResultSlot::new(),
            refresh: false,
            history_index: None,
        }
    }

    pub fn focus(mut self, entry: &str) -> Self {
        self.focused_entry = Some(entry.to_string());
        self
    }

    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn load_previous_view_state(mut self, load: bool) -> Self {
        self.load_previous_view_state = load;
        self
    }

    pub fn on_loaded(mut self, callback: impl FnOnce(ResultCode) + Send + 'static) -> Self {
        self.on_loaded = Some(Box::new(callback));
        self
    }

    /// Handle to the result slot, to read the outcome later
    pub fn result_slot(&self) -> ResultSlot {
        self.result.clone()
    }

    pub(crate) fn refresh(mut self) -> Self {
        self.refresh = true;
        self
    }

    /// Store the code and run the callback. Consumes the callback, so the
    /// request can complete only once.
    pub(crate) fn complete(&mut self, code: ResultCode) {
        if self.result.get().is_some() {
            return;
        }
        self.result.set(code);
        if let Some(callback) = self.on_loaded.take() {
            callback(code);
        }
    }
}

/// State of the newest navigation of a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    Idle,
    Loading,
    Applying,
}

struct EngineState {
    generation: u64,
    /// Flag of the newest asynchronous navigation, once known
    current: Option<CancelFlag>,
    state: NavigationState,
}

/// Serializes navigations of one panel: the newest request wins.
pub struct NavigationEngine {
    inner: Mutex<EngineState>,
}

impl Default for NavigationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EngineState {
                generation: 0,
                current: None,
                state: NavigationState::Idle,
            }),
        }
    }

    pub fn state(&self) -> NavigationState {
        self.inner.lock().state
    }

    /// Start a navigation: cancel the previous one (without waiting for it)
    /// and return the new generation.
    pub fn begin(&self) -> u64 {
        let mut inner = self.inner.lock();
        if let Some(previous) = inner.current.take() {
            previous.cancel();
        }
        inner.generation += 1;
        inner.state = NavigationState::Loading;
        tracing::trace!(generation = inner.generation, "navigation started");
        inner.generation
    }

    /// Hand `generation` over to a follow-up navigation (a resolved
    /// provider promise continuing into a directory load). Fails if
    /// something newer started in the meantime.
    pub fn continue_with(&self, generation: u64) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return None;
        }
        inner.current = None;
        inner.generation += 1;
        inner.state = NavigationState::Loading;
        Some(inner.generation)
    }

    /// Attach the cancellation flag of the task running `generation`.
    /// A flag of an already superseded generation is cancelled on the spot.
    pub fn track(&self, generation: u64, cancel: CancelFlag) {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.state == NavigationState::Loading {
            inner.current = Some(cancel);
        } else if inner.generation != generation {
            cancel.cancel();
        }
    }

    /// Whether `generation` is still the newest navigation
    pub fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().generation == generation
    }

    /// Run `apply` if `generation` is still the newest navigation and its
    /// flag is not set. Nothing can supersede it while `apply` runs.
    pub fn try_apply<R>(&self, generation: u64, cancel: &CancelFlag, apply: impl FnOnce() -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        if inner.generation != generation || cancel.is_cancelled() {
            return None;
        }
        inner.state = NavigationState::Applying;
        let result = apply();
        inner.state = NavigationState::Idle;
        inner.current = None;
        Some(result)
    }

    /// End `generation` without applying anything (error path). Runs
    /// `record` under the engine lock when it is still the newest.
    pub fn finish(&self, generation: u64, record: impl FnOnce()) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return false;
        }
        record();
        inner.state = NavigationState::Idle;
        inner.current = None;
        true
    }

    /// Cancel whatever is in flight and go idle (panel teardown)
    pub fn cancel_current(&self) {
        let mut inner = self.inner.lock();
        if let Some(current) = inner.current.take() {
            current.cancel();
        }
        inner.generation += 1;
        inner.state = NavigationState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_begin_cancels_previous_flag() {
        let engine = NavigationEngine::new();
        let first = engine.begin();
        let flag = CancelFlag::new();
        engine.track(first, flag.clone());
        assert_eq!(engine.state(), NavigationState::Loading);

        let second = engine.begin();
        assert!(flag.is_cancelled());
        assert!(!engine.is_current(first));
        assert!(engine.is_current(second));
    }

    #[test]
    fn test_track_of_superseded_generation_cancels() {
        let engine = NavigationEngine::new();
        let first = engine.begin();
        engine.begin();
        let flag = CancelFlag::new();
        engine.track(first, flag.clone());
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_stale_generation_does_not_apply() {
        let engine = NavigationEngine::new();
        let first = engine.begin();
        let second = engine.begin();

        assert!(engine.try_apply(first, &CancelFlag::new(), || ()).is_none());
        assert_eq!(engine.state(), NavigationState::Loading);
        assert_eq!(engine.try_apply(second, &CancelFlag::new(), || 7), Some(7));
        assert_eq!(engine.state(), NavigationState::Idle);
    }

    #[test]
    fn test_cancelled_flag_does_not_apply() {
        let engine = NavigationEngine::new();
        let generation = engine.begin();
        let flag = CancelFlag::new();
        flag.cancel();
        assert!(engine.try_apply(generation, &flag, || ()).is_none());
    }

    #[test]
    fn test_continue_with() {
        let engine = NavigationEngine::new();
        let first = engine.begin();
        let next = engine.continue_with(first).unwrap();
        assert!(engine.is_current(next));
        assert!(engine.continue_with(first).is_none());

        engine.begin();
        assert!(engine.continue_with(next).is_none());
    }

    #[test]
    fn test_finish_only_for_current() {
        let engine = NavigationEngine::new();
        let first = engine.begin();
        let second = engine.begin();
        let recorded = AtomicUsize::new(0);
        assert!(!engine.finish(first, || {
            recorded.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(engine.finish(second, || {
            recorded.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(recorded.load(Ordering::SeqCst), 1);
        assert_eq!(engine.state(), NavigationState::Idle);
    }

    #[test]
    fn test_request_completes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut request = DirectoryChangeRequest::new("/", Arc::new(MemoryProvider::new("t")))
            .on_loaded(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let slot = request.result_slot();
        assert_eq!(slot.get(), None);

        request.complete(ResultCode::NOT_FOUND);
        request.complete(ResultCode::OK);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(slot.get(), Some(ResultCode::NOT_FOUND));
    }
}
