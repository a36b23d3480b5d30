//! Panel data: the displayed listing, its sorted view, cursor and selection

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::fs::FileEntry;
use crate::providers::ProviderHandle;

/// How files are displayed in a panel
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Two columns, name only (classic Norton Commander look)
    #[default]
    Brief,
    /// Single column with full details
    Full,
}

impl ViewMode {
    pub fn from_config_str(s: &str) -> Self {
        match s {
            "full" => ViewMode::Full,
            _ => ViewMode::Brief,
        }
    }
}

/// Sort field for file listing
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Extension,
    Size,
    Modified,
    Unsorted,
}

/// Sort direction
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Sort configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub field: SortField,
    pub direction: SortDirection,
    pub dirs_first: bool,
    /// Sort uppercase-first names before lowercase-first names (within dirs/files groups)
    pub uppercase_first: bool,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            field: SortField::Name,
            direction: SortDirection::Ascending,
            dirs_first: true,
            uppercase_first: true,
        }
    }
}

impl SortConfig {
    pub fn from_config(config: &Config) -> Self {
        let field = match config.sorting.field.as_str() {
            "extension" => SortField::Extension,
            "size" => SortField::Size,
            "modified" => SortField::Modified,
            "unsorted" => SortField::Unsorted,
            _ => SortField::Name,
        };
        let direction = match config.sorting.direction.as_str() {
            "descending" => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        Self {
            field,
            direction,
            dirs_first: config.sorting.dirs_first,
            uppercase_first: config.sorting.uppercase_first,
        }
    }
}

/// An immutable directory listing produced by a fetch.
///
/// Uniform listings come from one directory of one provider. Non-uniform
/// listings (search results, temporary panels) have neither.
pub struct Listing {
    directory: Option<String>,
    provider: Option<ProviderHandle>,
    entries: Vec<FileEntry>,
}

impl std::fmt::Debug for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listing")
            .field("directory", &self.directory)
            .field("provider", &self.provider.as_ref().map(|p| p.info().name.clone()))
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Listing {
    pub fn uniform(directory: String, provider: ProviderHandle, entries: Vec<FileEntry>) -> Self {
        Self {
            directory: Some(directory),
            provider: Some(provider),
            entries,
        }
    }

    pub fn non_uniform(entries: Vec<FileEntry>) -> Self {
        Self {
            directory: None,
            provider: None,
            entries,
        }
    }

    pub fn empty() -> Self {
        Self::non_uniform(Vec::new())
    }

    pub fn is_uniform(&self) -> bool {
        self.directory.is_some() && self.provider.is_some()
    }

    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }

    pub fn provider(&self) -> Option<&ProviderHandle> {
        self.provider.as_ref()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }
}

/// The panel's model. Replaced wholesale by navigation, never edited by
/// background threads.
pub struct PanelData {
    listing: Arc<Listing>,
    /// Indices into the listing's entries, in sorted display order
    sorted_indices: Vec<usize>,
    /// Cursor position (index into sorted_indices)
    cursor: usize,
    /// Selected entry names
    selected: HashSet<String>,
    /// Directory sizes computed in the background, by entry name
    calculated_sizes: HashMap<String, u64>,
    /// Bumped whenever a new listing is loaded
    generation: u64,
    /// View mode (Brief or Full)
    pub view_mode: ViewMode,
    /// Sort configuration
    pub sort_config: SortConfig,
    /// Show hidden files (starting with .)
    pub show_hidden: bool,
    /// Error message of the last failed navigation
    pub error: Option<String>,
}

impl std::fmt::Debug for PanelData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelData")
            .field("directory", &self.listing.directory())
            .field("entries", &self.sorted_indices.len())
            .field("cursor", &self.cursor)
            .field("selected", &self.selected.len())
            .finish()
    }
}

impl Default for PanelData {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelData {
    pub fn new() -> Self {
        Self {
            listing: Arc::new(Listing::empty()),
            sorted_indices: Vec::new(),
            cursor: 0,
            selected: HashSet::new(),
            calculated_sizes: HashMap::new(),
            generation: 0,
            view_mode: ViewMode::default(),
            sort_config: SortConfig::default(),
            show_hidden: true,
            error: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            view_mode: ViewMode::from_config_str(&config.display.view_mode),
            sort_config: SortConfig::from_config(config),
            show_hidden: config.display.show_hidden,
            ..Self::new()
        }
    }

    /// Show a listing of a different location. Cursor, selection and
    /// calculated sizes start over.
    pub fn load(&mut self, listing: Arc<Listing>) {
        self.listing = listing;
        self.generation += 1;
        self.selected.clear();
        self.calculated_sizes.clear();
        self.error = None;
        self.cursor = 0;
        self.resort();
    }

    /// Show a fresh listing of the same location, keeping the cursor,
    /// selection and sizes of entries that are still there.
    pub fn reload(&mut self, listing: Arc<Listing>) {
        let focused = self.focused_name().map(str::to_string);
        let cursor = self.cursor;

        self.listing = listing;
        self.generation += 1;
        self.error = None;
        let present: HashSet<&str> = self.listing.entries().iter().map(|e| e.name.as_str()).collect();
        self.selected.retain(|name| present.contains(name.as_str()));
        self.calculated_sizes.retain(|name, _| present.contains(name.as_str()));
        self.resort();

        match focused.and_then(|name| self.display_index_of(&name)) {
            Some(index) => self.cursor = index,
            None => self.cursor = cursor.min(self.sorted_indices.len().saturating_sub(1)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn directory(&self) -> Option<&str> {
        self.listing.directory()
    }

    pub fn provider(&self) -> Option<&ProviderHandle> {
        self.listing.provider()
    }

    pub fn is_uniform(&self) -> bool {
        self.listing.is_uniform()
    }

    /// Classify a name's first character into a sort tier:
    /// 0 = dot-prefixed, 1 = uppercase-first, 2 = lowercase-first.
    fn name_tier(name: &str) -> u8 {
        match name.chars().next() {
            Some('.') => 0,
            Some(c) if c.is_uppercase() => 1,
            _ => 2,
        }
    }

    /// Compare two names by first-character tier: dot < uppercase < lowercase.
    fn uppercase_first_cmp(a: &str, b: &str) -> std::cmp::Ordering {
        Self::name_tier(a).cmp(&Self::name_tier(b))
    }

    /// Rebuild the display order from the sort configuration and hidden filter
    pub fn resort(&mut self) {
        let entries = self.listing.entries();
        let config = &self.sort_config;
        let sizes = &self.calculated_sizes;
        let size_of = |e: &FileEntry| sizes.get(&e.name).copied().unwrap_or(e.size);

        let show_hidden = self.show_hidden;
        self.sorted_indices = (0..entries.len())
            .filter(|&i| show_hidden || !entries[i].is_hidden || entries[i].is_parent_entry())
            .collect();

        self.sorted_indices.sort_by(|&a, &b| {
            let ea = &entries[a];
            let eb = &entries[b];

            // ".." always comes first
            match (ea.is_parent_entry(), eb.is_parent_entry()) {
                (true, true) => return a.cmp(&b),
                (true, false) => return std::cmp::Ordering::Less,
                (false, true) => return std::cmp::Ordering::Greater,
                (false, false) => {}
            }

            if config.dirs_first && ea.is_dir != eb.is_dir {
                return if ea.is_dir {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                };
            }

            let cmp = match config.field {
                SortField::Name => {
                    let base = ea.name.to_lowercase().cmp(&eb.name.to_lowercase());
                    if config.uppercase_first {
                        Self::uppercase_first_cmp(&ea.name, &eb.name).then(base)
                    } else {
                        base
                    }
                }
                SortField::Extension => {
                    let ext_a = ea.extension().unwrap_or("");
                    let ext_b = eb.extension().unwrap_or("");
                    ext_a
                        .to_lowercase()
                        .cmp(&ext_b.to_lowercase())
                        .then(ea.name.to_lowercase().cmp(&eb.name.to_lowercase()))
                }
                SortField::Size => size_of(ea).cmp(&size_of(eb)),
                SortField::Modified => ea.modified.cmp(&eb.modified),
                SortField::Unsorted => std::cmp::Ordering::Equal,
            };

            match config.direction {
                SortDirection::Ascending => cmp,
                SortDirection::Descending => cmp.reverse(),
            }
        });

        if self.cursor >= self.sorted_indices.len() {
            self.cursor = self.sorted_indices.len().saturating_sub(1);
        }
    }

    /// Get entry at a given display index
    pub fn entry_at(&self, display_index: usize) -> Option<&FileEntry> {
        self.sorted_indices
            .get(display_index)
            .and_then(|&idx| self.listing.entries().get(idx))
    }

    /// Entries in display order
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.sorted_indices.iter().map(|&idx| &self.listing.entries()[idx])
    }

    /// Number of displayed entries (including ..)
    pub fn entry_count(&self) -> usize {
        self.sorted_indices.len()
    }

    /// Display index of the entry called `name`
    pub fn display_index_of(&self, name: &str) -> Option<usize> {
        self.sorted_indices
            .iter()
            .position(|&idx| self.listing.entries()[idx].name == name)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Get the entry under the cursor
    pub fn focused_entry(&self) -> Option<&FileEntry> {
        self.entry_at(self.cursor)
    }

    pub fn focused_name(&self) -> Option<&str> {
        self.focused_entry().map(|e| e.name.as_str())
    }

    /// Move the cursor onto `name`. Returns false if it is not displayed.
    pub fn focus_name(&mut self, name: &str) -> bool {
        match self.display_index_of(name) {
            Some(index) => {
                self.cursor = index;
                true
            }
            None => false,
        }
    }

    /// Replace the selection with the entries called `names` (".." is never selected)
    pub fn select_entries_with_names(&mut self, names: &[String]) {
        self.selected = names
            .iter()
            .filter(|name| name.as_str() != crate::fs::PARENT_ENTRY_NAME && self.display_index_of(name).is_some())
            .cloned()
            .collect();
    }

    /// Set selection per display index; missing trailing flags mean unselected
    pub fn set_entries_selection(&mut self, selection: &[bool]) {
        let names: Vec<String> = self
            .entries()
            .zip(selection.iter().chain(std::iter::repeat(&false)))
            .filter(|(entry, selected)| **selected && !entry.is_parent_entry())
            .map(|(entry, _)| entry.name.clone())
            .collect();
        self.selected = names.into_iter().collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    /// Count of selected entries
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Selected names in display order
    pub fn selected_names(&self) -> Vec<String> {
        self.entries()
            .filter(|e| self.selected.contains(&e.name))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Size of an entry, preferring a calculated directory size
    pub fn entry_size(&self, name: &str) -> Option<u64> {
        if let Some(size) = self.calculated_sizes.get(name) {
            return Some(*size);
        }
        self.listing.entries().iter().find(|e| e.name == name).map(|e| e.size)
    }

    /// Store sizes calculated for the listing of `generation`; stale results are dropped
    pub fn apply_calculated_sizes(&mut self, generation: u64, sizes: Vec<(String, u64)>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.calculated_sizes.extend(sizes);
        if self.sort_config.field == SortField::Size {
            let focused = self.focused_name().map(str::to_string);
            self.resort();
            if let Some(name) = focused {
                self.focus_name(&name);
            }
        }
        true
    }

    /// Set sort field, toggling direction if same field
    pub fn set_sort_field(&mut self, field: SortField) {
        let mut config = self.sort_config;
        if config.field == field {
            config.direction = match config.direction {
                SortDirection::Ascending => SortDirection::Descending,
                SortDirection::Descending => SortDirection::Ascending,
            };
        } else {
            config.field = field;
            config.direction = SortDirection::Ascending;
        }
        self.set_sort_config(config);
    }

    /// Replace the sort configuration, keeping the cursor on the same entry
    pub fn set_sort_config(&mut self, config: SortConfig) {
        self.sort_config = config;
        self.resort_keeping_focus();
    }

    /// Show or hide hidden files, keeping the cursor on the same entry when possible
    pub fn set_show_hidden(&mut self, show: bool) {
        if self.show_hidden != show {
            self.show_hidden = show;
            let visible: HashSet<String> = self.entries().map(|e| e.name.clone()).collect();
            self.resort_keeping_focus();
            let still_visible: HashSet<String> = self.entries().map(|e| e.name.clone()).collect();
            self.selected.retain(|name| !visible.contains(name) || still_visible.contains(name));
        }
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    fn resort_keeping_focus(&mut self) {
        let focused = self.focused_name().map(str::to_string);
        self.resort();
        if let Some(name) = focused {
            self.focus_name(&name);
        }
    }
}
