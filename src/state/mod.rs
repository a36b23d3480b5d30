//! Panel state: data model, navigation and the background machinery around it

pub mod activity;
pub mod background;
pub mod controller;
pub mod focus;
pub mod history;
pub mod navigation;
pub mod panel;
pub mod persist;

pub use activity::{ActivityTicket, ActivityTracker, BusyObserver};
pub use background::{CancelFlag, CancelableTaskRunner};
pub use controller::PanelController;
pub use focus::{DelayedFocusScheduler, DelayedFocusing};
pub use navigation::{DirectoryChangeRequest, LoadingCallback, NavigationEngine, NavigationState, ResultSlot};
pub use panel::{Listing, PanelData, SortConfig, SortDirection, SortField, ViewMode};
pub use persist::{EncodeOptions, PanelStateDocument, PersistentLocation};
