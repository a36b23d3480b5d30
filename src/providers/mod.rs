//! Panel providers for different filesystem backends
//!
//! Providers abstract directory listing, allowing panels to work with:
//! - Local filesystems
//! - In-memory hosts (virtual trees, fixtures)
//! - Other backends registered through the [`ProviderRegistry`]

mod local;
mod memory;
mod registry;

pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use registry::{ProviderFactory, ProviderPromise, ProviderRegistry};

use std::sync::Arc;

use thiserror::Error;

use crate::errors::ResultCode;
use crate::fs::FileEntry;
use crate::state::background::CancelFlag;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Numeric code reported to navigation callbacks
    pub fn code(&self) -> ResultCode {
        match self {
            ProviderError::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ResultCode::NOT_FOUND,
                std::io::ErrorKind::PermissionDenied => ResultCode::PERMISSION_DENIED,
                std::io::ErrorKind::NotADirectory => ResultCode::NOT_A_DIRECTORY,
                std::io::ErrorKind::Interrupted => ResultCode::CANCELLED,
                _ => ResultCode::GENERIC,
            },
            ProviderError::Connection(_) => ResultCode::CONNECTION,
            ProviderError::NotFound(_) => ResultCode::NOT_FOUND,
            ProviderError::PermissionDenied(_) => ResultCode::PERMISSION_DENIED,
            ProviderError::NotADirectory(_) => ResultCode::NOT_A_DIRECTORY,
            ProviderError::Cancelled => ResultCode::CANCELLED,
            ProviderError::NotSupported(_) | ProviderError::Other(_) => ResultCode::GENERIC,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Information about a provider for display
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Display name (e.g., "Local", "memory://fixture")
    pub name: String,
    /// Short description
    pub description: String,
    /// Provider type identifier
    pub provider_type: ProviderType,
}

/// Type of provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    /// Local filesystem
    Local,
    /// In-memory virtual tree
    Memory,
}

/// Shared handle to a provider. Listing results keep their provider alive.
pub type ProviderHandle = Arc<dyn PanelProvider>;

/// Trait for panel filesystem providers
///
/// All paths are provider-relative strings (e.g., "/home/user" for local,
/// "/docs" for an in-memory host). Methods take `&self` because one provider
/// is shared between the panel and its background fetches.
pub trait PanelProvider: Send + Sync {
    /// Get provider information for display
    fn info(&self) -> &ProviderInfo;

    /// Serializable identity used to find or recreate this provider later
    fn promise(&self) -> ProviderPromise;

    /// Check if this provider is connected/ready
    fn is_connected(&self) -> bool {
        true
    }

    /// List directory contents. May be slow; implementations poll `cancel`
    /// and return [`ProviderError::Cancelled`] once it is set.
    fn list_directory(&self, path: &str, cancel: &CancelFlag) -> ProviderResult<Vec<FileEntry>>;

    /// Whether `path` exists and is a directory
    fn is_directory(&self, path: &str) -> bool;

    /// Total size of everything below `path`
    fn directory_size(&self, path: &str, cancel: &CancelFlag) -> ProviderResult<u64> {
        let mut total = 0;
        for entry in self.list_directory(path, cancel)? {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            if entry.is_parent_entry() {
                continue;
            }
            if entry.is_dir {
                total += self.directory_size(&self.join_path(path, &entry.name), cancel)?;
            } else {
                total += entry.size;
            }
        }
        Ok(total)
    }

    /// Get the home path of this provider
    fn home_path(&self) -> String;

    /// Normalize a path for this provider
    fn normalize_path(&self, path: &str) -> String;

    /// Get parent path, `None` at the root
    fn parent_path(&self, path: &str) -> Option<String>;

    /// Join path components
    fn join_path(&self, base: &str, name: &str) -> String;
}

/// Whether two handles point at the same provider instance
pub fn same_provider(a: &ProviderHandle, b: &ProviderHandle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ProviderError::NotFound("x".into()).code(), ResultCode::NOT_FOUND);
        assert_eq!(ProviderError::Cancelled.code(), ResultCode::CANCELLED);
        assert_eq!(
            ProviderError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied)).code(),
            ResultCode::PERMISSION_DENIED
        );
        assert_eq!(ProviderError::Other("boom".into()).code(), ResultCode::GENERIC);
    }

    #[test]
    fn test_same_provider() {
        let a: ProviderHandle = Arc::new(MemoryProvider::new("a"));
        let b: ProviderHandle = Arc::new(MemoryProvider::new("b"));
        assert!(same_provider(&a, &a.clone()));
        assert!(!same_provider(&a, &b));
    }
}
