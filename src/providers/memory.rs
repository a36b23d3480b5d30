//! In-memory provider
//!
//! A virtual tree held entirely in memory. Used for scratch hosts and
//! fixtures; it can simulate slow or failing backends.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::fs::{FileEntry, PARENT_ENTRY_NAME};
use crate::state::background::CancelFlag;
use super::{PanelProvider, ProviderError, ProviderInfo, ProviderPromise, ProviderResult, ProviderType};

/// Granularity of cancellation checks while simulating latency
const DELAY_POLL: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy)]
struct Node {
    is_dir: bool,
    size: u64,
}

#[derive(Default)]
struct Faults {
    delays: HashMap<String, Duration>,
    denied: HashSet<String>,
}

/// Provider backed by an in-memory directory tree
pub struct MemoryProvider {
    info: ProviderInfo,
    junction: String,
    /// directory path -> (child name -> node)
    tree: Mutex<BTreeMap<String, BTreeMap<String, Node>>>,
    faults: Mutex<Faults>,
    connected: AtomicBool,
    ignore_cancellation: AtomicBool,
    fetches: AtomicUsize,
}

impl std::fmt::Debug for MemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProvider")
            .field("junction", &self.junction)
            .field("directories", &self.tree.lock().len())
            .finish()
    }
}

/// Normalize an in-memory path: absolute, no empty or "." components,
/// ".." resolved, no trailing slash except for the root.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

fn split_parent(path: &str) -> Option<(String, String)> {
    if path == "/" {
        return None;
    }
    let idx = path.rfind('/')?;
    let parent = if idx == 0 { "/".to_string() } else { path[..idx].to_string() };
    Some((parent, path[idx + 1..].to_string()))
}

fn join(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

impl MemoryProvider {
    /// Create an empty tree (just "/") identified by `junction`
    pub fn new(junction: &str) -> Self {
        let mut tree = BTreeMap::new();
        tree.insert("/".to_string(), BTreeMap::new());
        Self {
            info: ProviderInfo {
                name: format!("memory://{}", junction),
                description: "In-memory tree".to_string(),
                provider_type: ProviderType::Memory,
            },
            junction: junction.to_string(),
            tree: Mutex::new(tree),
            faults: Mutex::new(Faults::default()),
            connected: AtomicBool::new(true),
            ignore_cancellation: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Create a directory, including missing ancestors
    pub fn add_dir(&self, path: &str) {
        let path = normalize(path);
        let mut tree = self.tree.lock();
        Self::insert(&mut tree, &path, Node { is_dir: true, size: 0 });
    }

    /// Create (or overwrite) a file, including missing ancestor directories
    pub fn add_file(&self, path: &str, size: u64) {
        let path = normalize(path);
        let mut tree = self.tree.lock();
        Self::insert(&mut tree, &path, Node { is_dir: false, size });
    }

    fn insert(tree: &mut BTreeMap<String, BTreeMap<String, Node>>, path: &str, node: Node) {
        let Some((parent, name)) = split_parent(path) else {
            return;
        };
        if !tree.contains_key(&parent) {
            Self::insert(tree, &parent, Node { is_dir: true, size: 0 });
        }
        if node.is_dir {
            tree.entry(path.to_string()).or_default();
        }
        if let Some(children) = tree.get_mut(&parent) {
            children.insert(name, node);
        }
    }

    /// Remove a file or a whole directory subtree. Returns false if nothing existed.
    pub fn remove(&self, path: &str) -> bool {
        let path = normalize(path);
        let Some((parent, name)) = split_parent(&path) else {
            return false;
        };
        let mut tree = self.tree.lock();
        let removed = tree
            .get_mut(&parent)
            .and_then(|children| children.remove(&name))
            .is_some();
        let prefix = join(&path, "");
        tree.retain(|dir, _| dir != &path && !dir.starts_with(&prefix));
        removed
    }

    /// Make listings of `path` take `delay` before returning
    pub fn set_delay(&self, path: &str, delay: Duration) {
        self.faults.lock().delays.insert(normalize(path), delay);
    }

    /// Make listings of `path` fail with permission denied
    pub fn deny(&self, path: &str) {
        self.faults.lock().denied.insert(normalize(path));
    }

    /// Simulate a backend that never polls its cancellation flag
    pub fn set_ignore_cancellation(&self, ignore: bool) {
        self.ignore_cancellation.store(ignore, Ordering::Relaxed);
    }

    /// Simulate losing (or regaining) the connection
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Number of `list_directory` calls made so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn simulate_latency(&self, path: &str, cancel: &CancelFlag) -> ProviderResult<()> {
        let delay = self.faults.lock().delays.get(path).copied();
        let Some(delay) = delay else {
            return Ok(());
        };
        let deadline = Instant::now() + delay;
        while Instant::now() < deadline {
            if cancel.is_cancelled() && !self.ignore_cancellation.load(Ordering::Relaxed) {
                return Err(ProviderError::Cancelled);
            }
            thread::sleep(DELAY_POLL);
        }
        Ok(())
    }
}

impl PanelProvider for MemoryProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    fn promise(&self) -> ProviderPromise {
        ProviderPromise::new(ProviderPromise::MEMORY_TAG, &self.junction)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn list_directory(&self, path: &str, cancel: &CancelFlag) -> ProviderResult<Vec<FileEntry>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let path = normalize(path);

        if !self.is_connected() {
            return Err(ProviderError::Connection(format!("{} is disconnected", self.info.name)));
        }
        if self.faults.lock().denied.contains(&path) {
            return Err(ProviderError::PermissionDenied(path));
        }
        self.simulate_latency(&path, cancel)?;

        let tree = self.tree.lock();
        let Some(children) = tree.get(&path) else {
            let is_file = split_parent(&path)
                .and_then(|(parent, name)| tree.get(&parent).and_then(|c| c.get(&name)).copied())
                .is_some_and(|node| !node.is_dir);
            return Err(if is_file {
                ProviderError::NotADirectory(path)
            } else {
                ProviderError::NotFound(path)
            });
        };

        let mut entries = Vec::with_capacity(children.len() + 1);
        if let Some((parent, _)) = split_parent(&path) {
            entries.push(FileEntry::virtual_entry(parent, PARENT_ENTRY_NAME, true, 0));
        }
        for (name, node) in children {
            entries.push(FileEntry::virtual_entry(join(&path, name), name, node.is_dir, node.size));
        }
        Ok(entries)
    }

    fn is_directory(&self, path: &str) -> bool {
        self.is_connected() && self.tree.lock().contains_key(&normalize(path))
    }

    fn home_path(&self) -> String {
        "/".to_string()
    }

    fn normalize_path(&self, path: &str) -> String {
        normalize(path)
    }

    fn parent_path(&self, path: &str) -> Option<String> {
        split_parent(&normalize(path)).map(|(parent, _)| parent)
    }

    fn join_path(&self, base: &str, name: &str) -> String {
        join(&normalize(base), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ResultCode;

    fn names(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/a//b/./c/"), "/a/b/c");
        assert_eq!(normalize("/a/b/../c"), "/a/c");
        assert_eq!(normalize("/.."), "/");
    }

    #[test]
    fn test_listing_creates_ancestors() {
        let provider = MemoryProvider::new("t");
        provider.add_file("/docs/reports/q1.txt", 10);

        let root = provider.list_directory("/", &CancelFlag::new()).unwrap();
        assert_eq!(names(&root), vec!["docs"]);

        let reports = provider.list_directory("/docs/reports", &CancelFlag::new()).unwrap();
        assert_eq!(names(&reports), vec!["..", "q1.txt"]);
        assert_eq!(reports[1].path.to_string_lossy(), "/docs/reports/q1.txt");
        assert_eq!(reports[0].path.to_string_lossy(), "/docs");
    }

    #[test]
    fn test_missing_and_file_paths() {
        let provider = MemoryProvider::new("t");
        provider.add_file("/a.txt", 1);

        let err = provider.list_directory("/nope", &CancelFlag::new()).unwrap_err();
        assert_eq!(err.code(), ResultCode::NOT_FOUND);
        let err = provider.list_directory("/a.txt", &CancelFlag::new()).unwrap_err();
        assert_eq!(err.code(), ResultCode::NOT_A_DIRECTORY);
    }

    #[test]
    fn test_remove_subtree() {
        let provider = MemoryProvider::new("t");
        provider.add_file("/a/b/c.txt", 1);
        provider.add_dir("/ab");

        assert!(provider.remove("/a"));
        assert!(!provider.is_directory("/a/b"));
        assert!(provider.is_directory("/ab"));
        assert!(!provider.remove("/a"));
    }

    #[test]
    fn test_faults() {
        let provider = MemoryProvider::new("t");
        provider.add_dir("/secret");
        provider.deny("/secret");
        let err = provider.list_directory("/secret", &CancelFlag::new()).unwrap_err();
        assert_eq!(err.code(), ResultCode::PERMISSION_DENIED);

        provider.set_connected(false);
        let err = provider.list_directory("/", &CancelFlag::new()).unwrap_err();
        assert_eq!(err.code(), ResultCode::CONNECTION);
        assert_eq!(provider.fetch_count(), 2);
    }

    #[test]
    fn test_delay_honours_cancellation() {
        let provider = MemoryProvider::new("t");
        provider.set_delay("/", Duration::from_secs(30));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = provider.list_directory("/", &cancel).unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
    }

    #[test]
    fn test_directory_size_recurses() {
        let provider = MemoryProvider::new("t");
        provider.add_file("/d/a", 3);
        provider.add_file("/d/sub/b", 4);
        assert_eq!(provider.directory_size("/d", &CancelFlag::new()).unwrap(), 7);
    }
}
