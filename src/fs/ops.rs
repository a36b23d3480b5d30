//! Filesystem operations

use std::fs;
use std::io;
use std::path::Path;

use super::entry::FileEntry;
use crate::state::background::CancelFlag;

/// Read directory contents and return a list of FileEntry.
///
/// The cancellation flag is polled between entries; a cancelled read
/// returns `ErrorKind::Interrupted`.
pub fn read_directory(path: &Path, cancel: &CancelFlag) -> io::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    if let Some(parent) = path.parent() {
        entries.push(FileEntry::parent_entry(parent.to_path_buf()));
    }

    for entry in fs::read_dir(path)? {
        if cancel.is_cancelled() {
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        let entry = entry?;
        match FileEntry::from_path(&entry.path()) {
            Ok(file_entry) => entries.push(file_entry),
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
            }
        }
    }

    Ok(entries)
}

/// Total size of a file or directory tree, polling the flag between entries.
pub fn path_size(path: &Path, cancel: &CancelFlag) -> io::Result<u64> {
    if cancel.is_cancelled() {
        return Err(io::Error::from(io::ErrorKind::Interrupted));
    }
    let metadata = fs::symlink_metadata(path)?;
    if !metadata.is_dir() {
        return Ok(metadata.len());
    }
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        // Unreadable children count as empty rather than failing the whole tree
        match path_size(&entry.path(), cancel) {
            Ok(size) => total += size,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(e),
            Err(_) => {}
        }
    }
    Ok(total)
}
