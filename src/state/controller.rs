//! Panel controller
//!
//! Owns one panel's data and everything that changes it: navigation,
//! activity tracking, delayed focusing and history. Background threads only
//! hold a `Weak` reference to the shared core, so dropping the controller
//! ends the panel even while fetches are still running.
//!
//! Lock order is navigation engine, then panel data, then history. Focus
//! hooks and loading callbacks run after every lock is released.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::errors::ResultCode;
use crate::fs::FileEntry;
use crate::providers::{ProviderError, ProviderHandle, ProviderPromise, ProviderRegistry};
use super::activity::{ActivityTicket, ActivityTracker, BusyObserver};
use super::background::{CancelFlag, CancelableTaskRunner};
use super::focus::{DelayedFocusScheduler, DelayedFocusing, FocusDone};
use super::history::{HistoryEntry, NavigationHistory};
use super::navigation::{DirectoryChangeRequest, LoadingCallback, NavigationEngine, NavigationState};
use super::panel::{Listing, PanelData, SortField, ViewMode};
use super::persist::{EncodeOptions, PanelStateDocument, PersistentLocation};

/// Candidate locations tried in order while recovering
type RecoveryQueue = VecDeque<(ProviderHandle, String)>;

struct PanelCore {
    /// Cleared when the controller is dropped
    alive: AtomicBool,
    activity: ActivityTracker,
    runner: CancelableTaskRunner,
    navigation: NavigationEngine,
    focus: DelayedFocusScheduler,
    data: Mutex<PanelData>,
    history: Mutex<NavigationHistory>,
    registry: Arc<ProviderRegistry>,
    focus_timeout: Duration,
    /// Configured recovery fallback; the native provider's home when unset
    home_path: Option<String>,
}

impl PanelCore {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn home_directory(&self) -> String {
        self.home_path
            .clone()
            .unwrap_or_else(|| self.registry.native().home_path())
    }

    fn submit(self: &Arc<Self>, request: DirectoryChangeRequest) -> ResultCode {
        let generation = self.navigation.begin();
        self.submit_as(generation, request)
    }

    /// Start loading `request` as navigation `generation`. Synchronous
    /// requests return their real outcome, asynchronous ones `OK` once
    /// accepted.
    fn submit_as(self: &Arc<Self>, generation: u64, mut request: DirectoryChangeRequest) -> ResultCode {
        if !self.is_alive() {
            request.complete(ResultCode::CANCELLED);
            return ResultCode::CANCELLED;
        }

        tracing::debug!(
            directory = %request.directory,
            provider = %request.provider.info().name,
            asynchronous = request.asynchronous,
            refresh = request.refresh,
            generation,
            "navigation submitted"
        );

        let ticket = self.activity.register_activity();
        let asynchronous = request.asynchronous;
        let slot = request.result_slot();
        let panel = Arc::downgrade(self);
        let cancel = self.runner.run(
            move |cancel| Self::load_directory(panel, generation, cancel, request, ticket),
            !asynchronous,
        );

        if asynchronous {
            self.navigation.track(generation, cancel);
            ResultCode::OK
        } else {
            slot.get().unwrap_or(ResultCode::CANCELLED)
        }
    }

    /// Body of a navigation task: fetch, then apply or report
    fn load_directory(
        panel: Weak<Self>,
        generation: u64,
        cancel: &CancelFlag,
        mut request: DirectoryChangeRequest,
        ticket: ActivityTicket,
    ) {
        request.directory = request.provider.normalize_path(&request.directory);
        let fetched = request.provider.list_directory(&request.directory, cancel);

        let Some(core) = panel.upgrade().filter(|core| core.is_alive()) else {
            request.complete(ResultCode::CANCELLED);
            return;
        };

        let code = match fetched {
            Ok(entries) => {
                let listing = Arc::new(Listing::uniform(
                    request.directory.clone(),
                    Arc::clone(&request.provider),
                    entries,
                ));
                match core.navigation.try_apply(generation, cancel, || core.apply(listing, &request)) {
                    Some(done) => {
                        if let Some(done) = done {
                            done();
                        }
                        ResultCode::OK
                    }
                    None => ResultCode::CANCELLED,
                }
            }
            Err(e) => core.fail(generation, cancel, &request, e),
        };

        tracing::debug!(directory = %request.directory, generation, %code, "navigation finished");
        let recover = request.refresh && (code == ResultCode::NOT_FOUND || code == ResultCode::NOT_A_DIRECTORY);
        request.complete(code);
        if recover {
            core.recover_from_invalid_directory(None);
        }
        ticket.release();
    }

    /// Hand a fetched listing to the panel. Runs under the navigation lock.
    fn apply(&self, listing: Arc<Listing>, request: &DirectoryChangeRequest) -> Option<FocusDone> {
        let mut data = self.data.lock();
        if request.refresh {
            data.reload(listing);
            return self.focus.on_listing_updated(&mut data);
        }

        let mut history = self.history.lock();
        if let Some(previous) = PersistentLocation::of_panel(&data, &self.registry) {
            history.save_focus(&previous, data.focused_name().map(str::to_string));
        }

        data.load(listing);
        self.focus.on_directory_changed();

        let location = PersistentLocation::of_panel(&data, &self.registry);
        let mut hint = request.focused_entry.clone();
        if hint.is_none() && request.load_previous_view_state {
            hint = location
                .as_ref()
                .and_then(|location| history.most_recent_for(location))
                .and_then(|entry| entry.focused.clone());
        }
        match (location, request.history_index) {
            (Some(location), Some(index)) => history.arrive_at(index, location),
            (Some(location), None) => history.put(location),
            (None, _) => {}
        }
        drop(history);

        let hint = hint?;
        self.focus
            .schedule(DelayedFocusing::new(&hint).timeout(self.focus_timeout), &mut data)
    }

    /// Result code for a failed fetch. Cancellation wins over the error.
    fn fail(&self, generation: u64, cancel: &CancelFlag, request: &DirectoryChangeRequest, error: ProviderError) -> ResultCode {
        if cancel.is_cancelled() || matches!(error, ProviderError::Cancelled) {
            self.navigation.finish(generation, || {});
            return ResultCode::CANCELLED;
        }

        let recorded = self.navigation.finish(generation, || {
            self.data.lock().error = Some(error.to_string());
        });
        if !recorded {
            return ResultCode::CANCELLED;
        }

        tracing::warn!(
            directory = %request.directory,
            provider = %request.provider.info().name,
            error = %error,
            "navigation failed"
        );
        error.code()
    }

    fn recover_from_invalid_directory(self: &Arc<Self>, on_loaded: Option<LoadingCallback>) {
        let current = {
            let data = self.data.lock();
            data.provider().cloned().zip(data.directory().map(str::to_string))
        };

        let mut candidates = RecoveryQueue::new();
        if let Some((provider, directory)) = current {
            let mut parent = provider.parent_path(&directory);
            while let Some(path) = parent {
                parent = provider.parent_path(&path);
                candidates.push_back((Arc::clone(&provider), path));
            }
        }
        candidates.push_back((self.registry.native(), self.home_directory()));

        tracing::info!(candidates = candidates.len(), "recovering from invalid directory");
        self.try_next_candidate(candidates, on_loaded, ResultCode::NOT_FOUND);
    }

    fn try_next_candidate(self: &Arc<Self>, mut candidates: RecoveryQueue, on_loaded: Option<LoadingCallback>, last: ResultCode) {
        // The home fallback is always attempted
        let next = loop {
            match candidates.pop_front() {
                Some((provider, path)) if !candidates.is_empty() && !provider.is_directory(&path) => {
                    tracing::trace!(%path, "skipping recovery candidate");
                }
                other => break other,
            }
        };

        let Some((provider, path)) = next else {
            tracing::warn!(code = %last, "could not recover from invalid directory");
            if let Some(callback) = on_loaded {
                callback(last);
            }
            return;
        };

        let panel = Arc::downgrade(self);
        let request = DirectoryChangeRequest::new(&path, provider).on_loaded(move |code| match panel.upgrade() {
            Some(core) if code.is_error() => core.try_next_candidate(candidates, on_loaded, code),
            _ => {
                if let Some(callback) = on_loaded {
                    callback(code);
                }
            }
        });
        self.submit(request);
    }

    /// Resolve `promise` in the background, then navigate to `path` on it
    fn go_to_promise(
        self: &Arc<Self>,
        promise: ProviderPromise,
        path: String,
        focused: Option<String>,
        history_index: Option<usize>,
        on_loaded: Option<LoadingCallback>,
    ) {
        if !self.is_alive() {
            if let Some(callback) = on_loaded {
                callback(ResultCode::CANCELLED);
            }
            return;
        }

        let generation = self.navigation.begin();
        let ticket = self.activity.register_activity();
        let registry = Arc::clone(&self.registry);
        let panel = Arc::downgrade(self);
        tracing::debug!(%promise, %path, generation, "resolving provider");

        let cancel = self.runner.run(
            move |cancel| {
                let resolved = registry.resolve(&promise);
                let Some(core) = panel.upgrade().filter(|core| core.is_alive()) else {
                    if let Some(callback) = on_loaded {
                        callback(ResultCode::CANCELLED);
                    }
                    return;
                };

                let code = match resolved {
                    Ok(provider) if !cancel.is_cancelled() => match core.navigation.continue_with(generation) {
                        Some(next) => {
                            let mut request = DirectoryChangeRequest::new(&path, provider).load_previous_view_state(true);
                            request.focused_entry = focused;
                            request.history_index = history_index;
                            request.on_loaded = on_loaded;
                            core.submit_as(next, request);
                            return;
                        }
                        None => ResultCode::CANCELLED,
                    },
                    Ok(_) => ResultCode::CANCELLED,
                    Err(_) if cancel.is_cancelled() => ResultCode::CANCELLED,
                    Err(e) => {
                        let recorded = core.navigation.finish(generation, || {
                            core.data.lock().error = Some(e.to_string());
                        });
                        if recorded {
                            tracing::warn!(%promise, error = %e, "could not resolve provider");
                            e.code()
                        } else {
                            ResultCode::CANCELLED
                        }
                    }
                };

                if let Some(callback) = on_loaded {
                    callback(code);
                }
                ticket.release();
            },
            false,
        );
        self.navigation.track(generation, cancel);
    }

    fn go_to_location(
        self: &Arc<Self>,
        location: PersistentLocation,
        focused: Option<String>,
        history_index: Option<usize>,
        on_loaded: Option<LoadingCallback>,
    ) {
        let current = self.data.lock().provider().cloned();
        let matching = current.filter(|provider| self.registry.promise_for(provider).as_ref() == Some(&location.provider));

        match matching {
            Some(provider) => {
                let mut request = DirectoryChangeRequest::new(&location.path, provider).load_previous_view_state(true);
                request.focused_entry = focused;
                request.history_index = history_index;
                request.on_loaded = on_loaded;
                self.submit(request);
            }
            None => self.go_to_promise(location.provider, location.path, focused, history_index, on_loaded),
        }
    }
}

/// One file panel: its data plus the machinery that navigates it.
pub struct PanelController {
    core: Arc<PanelCore>,
}

impl PanelController {
    pub fn new(config: &Config, registry: Arc<ProviderRegistry>) -> Self {
        let home_path = Some(config.navigation.home_path.clone()).filter(|path| !path.is_empty());
        Self {
            core: Arc::new(PanelCore {
                alive: AtomicBool::new(true),
                activity: ActivityTracker::new(),
                runner: CancelableTaskRunner::new(),
                navigation: NavigationEngine::new(),
                focus: DelayedFocusScheduler::new(),
                data: Mutex::new(PanelData::from_config(config)),
                history: Mutex::new(NavigationHistory::new()),
                registry,
                focus_timeout: config.navigation.delayed_focus_timeout(),
                home_path,
            }),
        }
    }

    // ---- activity ----

    /// Register an outstanding operation; the panel is busy until the ticket drops
    pub fn register_activity(&self) -> ActivityTicket {
        self.core.activity.register_activity()
    }

    pub fn is_busy(&self) -> bool {
        self.core.activity.is_busy()
    }

    pub fn set_busy_observer(&self, observer: Option<BusyObserver>) {
        self.core.activity.set_busy_observer(observer);
    }

    /// Block until no background work is in flight. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.core.activity.wait_idle(timeout)
    }

    pub fn navigation_state(&self) -> NavigationState {
        self.core.navigation.state()
    }

    // ---- navigation ----

    /// Submit a directory change. Supersedes any navigation in flight.
    pub fn go_to_dir_with_context(&self, request: DirectoryChangeRequest) -> ResultCode {
        self.core.submit(request)
    }

    pub fn go_to_dir(
        &self,
        directory: &str,
        provider: ProviderHandle,
        select_entry: Option<&str>,
        asynchronous: bool,
    ) -> ResultCode {
        self.go_to_dir_with_state(directory, provider, select_entry, asynchronous, false)
    }

    pub fn go_to_dir_with_state(
        &self,
        directory: &str,
        provider: ProviderHandle,
        select_entry: Option<&str>,
        asynchronous: bool,
        load_previous_state: bool,
    ) -> ResultCode {
        let mut request = DirectoryChangeRequest::new(directory, provider)
            .asynchronous(asynchronous)
            .load_previous_view_state(load_previous_state);
        if let Some(entry) = select_entry {
            request = request.focus(entry);
        }
        self.core.submit(request)
    }

    /// Navigate to `path` on the provider behind `promise`, resolving it first
    pub fn go_to_provider_promise(
        &self,
        promise: ProviderPromise,
        path: &str,
        on_loaded: Option<LoadingCallback>,
    ) {
        self.core.go_to_promise(promise, path.to_string(), None, None, on_loaded);
    }

    pub fn go_to_persistent_location(&self, location: &PersistentLocation, on_loaded: Option<LoadingCallback>) {
        self.core.go_to_location(location.clone(), None, None, on_loaded);
    }

    /// Step back in history. Returns false when there is nothing to go back to.
    /// The history position moves only once the older location has loaded.
    pub fn go_back(&self) -> bool {
        let target = self.core.history.lock().back_target().map(|(index, entry)| (index, entry.clone()));
        self.browse_history(target)
    }

    /// Step forward in history. Returns false at the newest entry.
    pub fn go_forward(&self) -> bool {
        let target = self.core.history.lock().forward_target().map(|(index, entry)| (index, entry.clone()));
        self.browse_history(target)
    }

    fn browse_history(&self, target: Option<(usize, HistoryEntry)>) -> bool {
        let Some((index, entry)) = target else {
            return false;
        };
        self.core.go_to_location(entry.location, entry.focused, Some(index), None);
        true
    }

    pub fn can_go_back(&self) -> bool {
        self.core.history.lock().can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.core.history.lock().can_go_forward()
    }

    /// Re-fetch the displayed directory in the background.
    ///
    /// Skipped (returns false) while a navigation is loading or when the
    /// panel shows no uniform listing.
    pub fn refresh_panel(&self) -> bool {
        if self.core.navigation.state() == NavigationState::Loading {
            tracing::debug!("refresh skipped, navigation in progress");
            return false;
        }

        let (provider, directory) = {
            let data = self.core.data.lock();
            match (data.provider(), data.directory()) {
                (Some(provider), Some(directory)) => (Arc::clone(provider), directory.to_string()),
                _ => return false,
            }
        };
        self.core.submit(DirectoryChangeRequest::new(&directory, provider).refresh());
        true
    }

    /// Walk up from the current directory to the nearest one that still
    /// loads, falling back to the home directory on the native provider.
    pub fn recover_from_invalid_directory(&self, on_loaded: Option<LoadingCallback>) {
        self.core.recover_from_invalid_directory(on_loaded);
    }

    /// Show entries that belong to no single directory (search results)
    pub fn load_non_uniform_listing(&self, entries: Vec<FileEntry>) {
        let core = &self.core;
        let generation = core.navigation.begin();
        let _ticket = core.activity.register_activity();
        let listing = Arc::new(Listing::non_uniform(entries));

        core.navigation.try_apply(generation, &CancelFlag::new(), || {
            let mut data = core.data.lock();
            if let Some(previous) = PersistentLocation::of_panel(&data, &core.registry) {
                core.history
                    .lock()
                    .save_focus(&previous, data.focused_name().map(str::to_string));
            }
            data.load(listing);
            core.focus.on_directory_changed();
        });
        tracing::debug!(generation, "non-uniform listing loaded");
    }

    // ---- focus ----

    /// Focus `request.filename` now or once it shows up
    pub fn schedule_delayed_focus(&self, request: DelayedFocusing) {
        let done = {
            let mut data = self.core.data.lock();
            self.core.focus.schedule(request, &mut data)
        };
        if let Some(done) = done {
            done();
        }
    }

    /// Name a delayed focus request is still waiting for
    pub fn pending_focus(&self) -> Option<String> {
        self.core.focus.pending_filename()
    }

    // ---- sizes ----

    /// Compute sizes of the named directories in the background.
    ///
    /// Results land only if the same listing is still displayed. Returns
    /// false when none of the names is a directory.
    pub fn calculate_sizes_of_items(&self, names: &[String]) -> bool {
        let (provider, directory, generation, targets) = {
            let data = self.core.data.lock();
            let (Some(provider), Some(directory)) = (data.provider(), data.directory()) else {
                return false;
            };
            let targets: Vec<String> = data
                .entries()
                .filter(|entry| entry.is_dir && !entry.is_parent_entry() && names.contains(&entry.name))
                .map(|entry| entry.name.clone())
                .collect();
            (Arc::clone(provider), directory.to_string(), data.generation(), targets)
        };
        if targets.is_empty() {
            return false;
        }

        let ticket = self.core.activity.register_activity();
        let panel = Arc::downgrade(&self.core);
        self.core.runner.run(
            move |cancel| {
                let mut sizes = Vec::with_capacity(targets.len());
                for name in targets {
                    let path = provider.join_path(&directory, &name);
                    match provider.directory_size(&path, cancel) {
                        Ok(size) => sizes.push((name, size)),
                        Err(ProviderError::Cancelled) => break,
                        Err(e) => tracing::warn!(%path, error = %e, "could not calculate size"),
                    }
                }
                if cancel.is_cancelled() {
                    return;
                }
                if let Some(core) = panel.upgrade()
                    && !core.data.lock().apply_calculated_sizes(generation, sizes)
                {
                    tracing::debug!(%directory, "dropping sizes of a replaced listing");
                }
                ticket.release();
            },
            false,
        );
        true
    }

    // ---- state ----

    /// Encode the requested parts of the panel state
    pub fn encode_state(&self, options: EncodeOptions) -> Option<serde_json::Value> {
        let document = {
            let data = self.core.data.lock();
            PanelStateDocument::capture(&data, options, &self.core.registry)?
        };
        match document.to_value() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "could not encode panel state");
                None
            }
        }
    }

    pub fn encode_restorable_state(&self) -> Option<serde_json::Value> {
        self.encode_state(EncodeOptions::EVERYTHING)
    }

    /// Apply encoded state. Options take effect immediately, a stored
    /// location is navigated to in the background.
    pub fn load_state(&self, state: &serde_json::Value) -> bool {
        let document = match PanelStateDocument::from_value(state) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed panel state");
                return false;
            }
        };

        document.apply_options(&mut self.core.data.lock());
        if let Some(content) = document.content {
            self.core.go_to_location(content.location, content.focused, None, None);
        }
        true
    }

    pub fn load_restorable_state(&self, state: &serde_json::Value) -> bool {
        self.load_state(state)
    }

    // ---- data ----

    /// Run `f` with the panel data locked
    pub fn with_data<R>(&self, f: impl FnOnce(&PanelData) -> R) -> R {
        f(&self.core.data.lock())
    }

    pub fn directory(&self) -> Option<String> {
        self.core.data.lock().directory().map(str::to_string)
    }

    pub fn focused_name(&self) -> Option<String> {
        self.core.data.lock().focused_name().map(str::to_string)
    }

    /// Where the panel is, if it can be restored later
    pub fn current_location(&self) -> Option<PersistentLocation> {
        PersistentLocation::of_panel(&self.core.data.lock(), &self.core.registry)
    }

    pub fn change_sort_field(&self, field: SortField) {
        self.core.data.lock().set_sort_field(field);
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        self.core.data.lock().set_view_mode(mode);
    }

    pub fn set_show_hidden(&self, show: bool) {
        self.core.data.lock().set_show_hidden(show);
    }

    pub fn select_entries_with_names(&self, names: &[String]) {
        self.core.data.lock().select_entries_with_names(names);
    }

    pub fn set_entries_selection(&self, selection: &[bool]) {
        self.core.data.lock().set_entries_selection(selection);
    }

    /// Take over sorting, filtering and view mode of another panel
    pub fn copy_options_from(&self, other: &PanelController) {
        let (sort, show_hidden, view_mode) = {
            let data = other.core.data.lock();
            (data.sort_config, data.show_hidden, data.view_mode)
        };
        let mut data = self.core.data.lock();
        data.set_view_mode(view_mode);
        data.set_show_hidden(show_hidden);
        data.set_sort_config(sort);
    }
}

impl Drop for PanelController {
    fn drop(&mut self) {
        self.core.alive.store(false, Ordering::Release);
        self.core.navigation.cancel_current();
        self.core.runner.cancel_all();
        self.core.focus.on_directory_changed();
        tracing::debug!("panel closed");
    }
}
