//! Navigation history: visited locations with back/forward browsing

use super::persist::PersistentLocation;

/// Maximum number of remembered locations
const HISTORY_LIMIT: usize = 128;

/// One visited location and the entry that was focused when leaving it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub location: PersistentLocation,
    pub focused: Option<String>,
}

/// Manages visited locations and back/forward navigation
#[derive(Debug, Default)]
pub struct NavigationHistory {
    /// History entries (oldest first)
    entries: Vec<HistoryEntry>,
    /// Current position while browsing with back/forward (None = at the newest entry)
    index: Option<usize>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record arrival at `location`
    pub fn put(&mut self, location: PersistentLocation) {
        if let Some(idx) = self.index {
            if self.entries.get(idx).is_some_and(|e| e.location == location) {
                // Arrived where back/forward pointed
                return;
            }
            // Navigating elsewhere drops the forward part
            self.entries.truncate(idx + 1);
            self.index = None;
        }

        if self.entries.last().map(|e| &e.location) != Some(&location) {
            self.entries.push(HistoryEntry { location, focused: None });
            if self.entries.len() > HISTORY_LIMIT {
                self.entries.remove(0);
            }
        }
    }

    /// Remember which entry was focused at `location`
    pub fn save_focus(&mut self, location: &PersistentLocation, focused: Option<String>) {
        if let Some(entry) = self.entries.iter_mut().rev().find(|e| &e.location == location) {
            entry.focused = focused;
        }
    }

    /// Most recent visit of `location`
    pub fn most_recent_for(&self, location: &PersistentLocation) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|e| &e.location == location)
    }

    fn position(&self) -> Option<usize> {
        self.index.or_else(|| self.entries.len().checked_sub(1))
    }

    pub fn can_go_back(&self) -> bool {
        self.position().is_some_and(|pos| pos > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.index.is_some_and(|idx| idx + 1 < self.entries.len())
    }

    /// Entry one step back (older), with its index. Does not move.
    pub fn back_target(&self) -> Option<(usize, &HistoryEntry)> {
        let pos = self.position()?.checked_sub(1)?;
        self.entries.get(pos).map(|entry| (pos, entry))
    }

    /// Entry one step forward (newer), with its index. Does not move.
    pub fn forward_target(&self) -> Option<(usize, &HistoryEntry)> {
        let pos = self.index? + 1;
        self.entries.get(pos).map(|entry| (pos, entry))
    }

    /// Record arrival at `location` reached by browsing to `index`.
    /// Falls back to `put` when the history changed in the meantime.
    pub fn arrive_at(&mut self, index: usize, location: PersistentLocation) {
        if self.entries.get(index).is_some_and(|e| e.location == location) {
            self.index = Some(index);
        } else {
            self.put(location);
        }
    }

    /// Number of remembered locations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderPromise;

    fn loc(path: &str) -> PersistentLocation {
        PersistentLocation::new(ProviderPromise::native(), path)
    }

    #[test]
    fn test_put_skips_consecutive_duplicates() {
        let mut history = NavigationHistory::new();
        history.put(loc("/a"));
        history.put(loc("/a"));
        history.put(loc("/b"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_back_and_forward() {
        let mut history = NavigationHistory::new();
        history.put(loc("/a"));
        history.put(loc("/b"));
        history.put(loc("/c"));
        assert!(history.forward_target().is_none());

        let (idx, entry) = history.back_target().unwrap();
        assert_eq!((idx, &entry.location), (1, &loc("/b")));
        // Looking does not move
        assert_eq!(history.back_target().unwrap().0, 1);

        history.arrive_at(1, loc("/b"));
        assert!(history.can_go_forward());
        history.arrive_at(0, loc("/a"));
        assert!(history.back_target().is_none());

        assert_eq!(history.forward_target().unwrap().1.location, loc("/b"));
        history.arrive_at(2, loc("/c"));
        assert!(history.forward_target().is_none());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_arrive_at_changed_index_records_visit() {
        let mut history = NavigationHistory::new();
        history.put(loc("/a"));
        history.put(loc("/b"));
        history.arrive_at(0, loc("/x"));
        assert_eq!(history.len(), 3);
        assert!(!history.can_go_forward());
    }

    #[test]
    fn test_new_location_drops_forward_part() {
        let mut history = NavigationHistory::new();
        history.put(loc("/a"));
        history.put(loc("/b"));
        history.arrive_at(0, loc("/a"));
        history.put(loc("/x"));

        assert!(!history.can_go_forward());
        assert_eq!(history.back_target().unwrap().1.location, loc("/a"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_saved_focus() {
        let mut history = NavigationHistory::new();
        history.put(loc("/a"));
        history.save_focus(&loc("/a"), Some("file.txt".to_string()));
        assert_eq!(
            history.most_recent_for(&loc("/a")).and_then(|e| e.focused.as_deref()),
            Some("file.txt")
        );
        assert!(history.most_recent_for(&loc("/b")).is_none());
    }

    #[test]
    fn test_limit() {
        let mut history = NavigationHistory::new();
        for i in 0..HISTORY_LIMIT + 10 {
            history.put(loc(&format!("/{}", i)));
        }
        assert_eq!(history.len(), HISTORY_LIMIT);
    }
}
