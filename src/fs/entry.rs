//! File entry representation

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Name of the synthetic parent-directory entry
pub const PARENT_ENTRY_NAME: &str = "..";

/// Represents a single file or directory entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// File/directory name (not full path)
    pub name: String,
    /// Full path to the entry (provider-relative for non-local providers)
    pub path: PathBuf,
    /// Whether this is a directory
    pub is_dir: bool,
    /// File size in bytes (0 for directories until sizes are calculated)
    pub size: u64,
    /// Last modification time
    pub modified: Option<SystemTime>,
    /// Whether this is a hidden file (starts with '.' on Unix)
    pub is_hidden: bool,
    /// Unix permission bits or Windows file attributes
    pub permissions: u32,
    /// Whether this is a symbolic link
    pub is_symlink: bool,
    /// Target of symlink if applicable
    pub symlink_target: Option<PathBuf>,
}

impl FileEntry {
    /// Create a FileEntry from a local path
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let is_symlink = metadata.is_symlink();
        let symlink_target = if is_symlink {
            fs::read_link(path).ok()
        } else {
            None
        };

        // Symlinks report the target's kind and size
        let target_metadata = if is_symlink {
            fs::metadata(path).ok()
        } else {
            Some(metadata.clone())
        };

        let is_dir = target_metadata.as_ref().is_some_and(|m| m.is_dir());
        let size = if is_dir {
            0
        } else {
            target_metadata.as_ref().map(|m| m.len()).unwrap_or(0)
        };

        #[cfg(windows)]
        let is_hidden = {
            use std::os::windows::fs::MetadataExt;
            const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
            metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
        };
        #[cfg(not(windows))]
        let is_hidden = name.starts_with('.');

        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode()
        };
        #[cfg(windows)]
        let permissions = {
            use std::os::windows::fs::MetadataExt;
            metadata.file_attributes()
        };
        #[cfg(not(any(unix, windows)))]
        let permissions = 0u32;

        Ok(Self {
            name,
            path: path.to_path_buf(),
            is_dir,
            size,
            modified: metadata.modified().ok(),
            is_hidden,
            permissions,
            is_symlink,
            symlink_target,
        })
    }

    /// Create an entry for a provider that has no real metadata to offer
    pub fn virtual_entry(path: impl Into<PathBuf>, name: &str, is_dir: bool, size: u64) -> Self {
        Self {
            name: name.to_string(),
            path: path.into(),
            is_dir,
            size: if is_dir { 0 } else { size },
            modified: None,
            is_hidden: name.starts_with('.') && name != PARENT_ENTRY_NAME,
            permissions: 0,
            is_symlink: false,
            symlink_target: None,
        }
    }

    /// Create the special ".." parent directory entry with actual parent metadata
    pub fn parent_entry(parent_path: PathBuf) -> Self {
        if let Ok(mut entry) = Self::from_path(&parent_path) {
            entry.name = PARENT_ENTRY_NAME.to_string();
            entry.is_hidden = false;
            return entry;
        }
        Self::virtual_entry(parent_path, PARENT_ENTRY_NAME, true, 0)
    }

    /// Whether this is the synthetic ".." entry
    pub fn is_parent_entry(&self) -> bool {
        self.name == PARENT_ENTRY_NAME
    }

    /// Get the file extension, if any
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|s| s.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_reads_file_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, b"hello").unwrap();

        let entry = FileEntry::from_path(&file).unwrap();
        assert_eq!(entry.name, "notes.txt");
        assert!(!entry.is_dir);
        assert_eq!(entry.size, 5);
        assert_eq!(entry.extension(), Some("txt"));
    }

    #[test]
    fn test_virtual_dir_has_no_size() {
        let entry = FileEntry::virtual_entry("/a/b", "b", true, 42);
        assert!(entry.is_dir);
        assert_eq!(entry.size, 0);
        assert!(!entry.is_parent_entry());
    }

    #[test]
    fn test_parent_entry_never_hidden() {
        let entry = FileEntry::virtual_entry("/", PARENT_ENTRY_NAME, true, 0);
        assert!(entry.is_parent_entry());
        assert!(!entry.is_hidden);
    }
}
