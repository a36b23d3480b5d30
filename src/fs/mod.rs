//! Filesystem module

pub mod entry;
pub mod ops;

pub use entry::{FileEntry, PARENT_ENTRY_NAME};
pub use ops::{path_size, read_directory};
