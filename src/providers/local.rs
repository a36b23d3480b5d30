//! Local filesystem provider

use std::io;
use std::path::Path;

use crate::fs::FileEntry;
use crate::state::background::CancelFlag;
use super::{PanelProvider, ProviderError, ProviderInfo, ProviderPromise, ProviderResult, ProviderType};

/// Provider for local filesystem operations
#[derive(Debug)]
pub struct LocalProvider {
    info: ProviderInfo,
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalProvider {
    /// Create a new local provider
    pub fn new() -> Self {
        Self {
            info: ProviderInfo {
                name: "Local".to_string(),
                description: "Local filesystem".to_string(),
                provider_type: ProviderType::Local,
            },
        }
    }
}

fn map_io(err: io::Error) -> ProviderError {
    if err.kind() == io::ErrorKind::Interrupted {
        ProviderError::Cancelled
    } else {
        ProviderError::Io(err)
    }
}

impl PanelProvider for LocalProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn promise(&self) -> ProviderPromise {
        ProviderPromise::native()
    }

    fn list_directory(&self, path: &str, cancel: &CancelFlag) -> ProviderResult<Vec<FileEntry>> {
        crate::fs::read_directory(Path::new(path), cancel).map_err(map_io)
    }

    fn is_directory(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn directory_size(&self, path: &str, cancel: &CancelFlag) -> ProviderResult<u64> {
        crate::fs::path_size(Path::new(path), cancel).map_err(map_io)
    }

    fn home_path(&self) -> String {
        #[cfg(unix)]
        {
            std::env::var("HOME").unwrap_or_else(|_| "/".to_string())
        }
        #[cfg(windows)]
        {
            std::env::var("USERPROFILE").unwrap_or_else(|_| "C:\\".to_string())
        }
        #[cfg(not(any(unix, windows)))]
        {
            "/".to_string()
        }
    }

    fn normalize_path(&self, path: &str) -> String {
        let path = Path::new(path);
        path.canonicalize()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.to_string_lossy().into_owned())
    }

    fn parent_path(&self, path: &str) -> Option<String> {
        Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
    }

    fn join_path(&self, base: &str, name: &str) -> String {
        Path::new(base)
            .join(name)
            .to_string_lossy()
            .into_owned()
    }
}
