//! Bark panel core
//!
//! Navigation, background activity tracking, cancellation and delayed
//! focusing for one file panel, independent of any UI.

pub mod config;
pub mod errors;
pub mod fs;
pub mod providers;
pub mod state;

pub use config::Config;
pub use errors::{AppError, AppResult, ResultCode};
pub use providers::{PanelProvider, ProviderError, ProviderHandle, ProviderPromise, ProviderRegistry};
pub use state::{DelayedFocusing, DirectoryChangeRequest, EncodeOptions, PanelController, PersistentLocation};
