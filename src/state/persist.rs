//! Persisted panel state: what to encode and the encoded document

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::providers::{ProviderPromise, ProviderRegistry};
use super::panel::{PanelData, SortConfig, ViewMode};

bitflags! {
    /// Parts of the panel state to encode
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EncodeOptions: u8 {
        /// Sorting and hidden-file filtering
        const DATA_OPTIONS = 1;
        /// Presentation (view mode)
        const VIEW_OPTIONS = 1 << 1;
        /// Location and focused entry
        const CONTENT_STATE = 1 << 2;
    }
}

impl EncodeOptions {
    pub const NOTHING: Self = Self::empty();
    pub const EVERYTHING: Self = Self::all();
}

/// A provider identity plus a path on it: enough to come back later
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersistentLocation {
    pub provider: ProviderPromise,
    pub path: String,
}

impl PersistentLocation {
    pub fn new(provider: ProviderPromise, path: &str) -> Self {
        Self {
            provider,
            path: path.to_string(),
        }
    }

    /// Location of the listing `data` shows, if it can be restored later
    pub fn of_panel(data: &PanelData, registry: &ProviderRegistry) -> Option<Self> {
        let directory = data.directory()?;
        let promise = registry.promise_for(data.provider()?)?;
        Some(Self::new(promise, directory))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataOptionsState {
    pub sort: SortConfig,
    pub show_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOptionsState {
    pub view_mode: ViewMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentState {
    pub location: PersistentLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused: Option<String>,
}

/// Encoded form of a panel's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStateDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataOptionsState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewOptionsState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentState>,
}

impl PanelStateDocument {
    /// Capture the requested parts of `data`. `None` when content state is
    /// requested but the panel's location cannot be restored.
    pub fn capture(data: &PanelData, options: EncodeOptions, registry: &ProviderRegistry) -> Option<Self> {
        let mut doc = Self::default();
        if options.contains(EncodeOptions::DATA_OPTIONS) {
            doc.data = Some(DataOptionsState {
                sort: data.sort_config,
                show_hidden: data.show_hidden,
            });
        }
        if options.contains(EncodeOptions::VIEW_OPTIONS) {
            doc.view = Some(ViewOptionsState {
                view_mode: data.view_mode,
            });
        }
        if options.contains(EncodeOptions::CONTENT_STATE) {
            doc.content = Some(ContentState {
                location: PersistentLocation::of_panel(data, registry)?,
                focused: data.focused_name().map(str::to_string),
            });
        }
        Some(doc)
    }

    pub fn to_value(&self) -> AppResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: &serde_json::Value) -> AppResult<Self> {
        Ok(Self::deserialize(value)?)
    }

    /// Apply the option parts (not the content) to `data`
    pub fn apply_options(&self, data: &mut PanelData) {
        if let Some(view) = &self.view {
            data.set_view_mode(view.view_mode);
        }
        if let Some(options) = &self.data {
            data.set_show_hidden(options.show_hidden);
            data.set_sort_config(options.sort);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MemoryProvider, ProviderHandle};
    use crate::state::panel::{Listing, SortField};
    use crate::fs::FileEntry;
    use std::sync::Arc;

    #[test]
    fn test_everything_and_nothing() {
        assert_eq!(EncodeOptions::EVERYTHING.bits(), 0b111);
        assert!(EncodeOptions::NOTHING.is_empty());
        assert_eq!(
            EncodeOptions::DATA_OPTIONS | EncodeOptions::VIEW_OPTIONS | EncodeOptions::CONTENT_STATE,
            EncodeOptions::EVERYTHING
        );
    }

    #[test]
    fn test_nothing_encodes_empty_object() {
        let registry = ProviderRegistry::new();
        let doc = PanelStateDocument::capture(&PanelData::new(), EncodeOptions::NOTHING, &registry).unwrap();
        assert_eq!(doc.to_value().unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_content_requires_restorable_location() {
        let registry = ProviderRegistry::new();
        let data = PanelData::new();
        assert!(PanelStateDocument::capture(&data, EncodeOptions::CONTENT_STATE, &registry).is_none());
        assert!(PanelStateDocument::capture(&data, EncodeOptions::DATA_OPTIONS, &registry).is_some());
    }

    #[test]
    fn test_capture_and_apply_options() {
        let registry = ProviderRegistry::new();
        let provider: ProviderHandle = Arc::new(MemoryProvider::new("docs"));
        registry.register_instance(&provider);

        let mut data = PanelData::new();
        data.load(Arc::new(Listing::uniform(
            "/".to_string(),
            provider,
            vec![FileEntry::virtual_entry("/a", "a", false, 1)],
        )));
        data.set_view_mode(ViewMode::Full);
        data.set_sort_field(SortField::Size);
        data.set_show_hidden(false);

        let doc = PanelStateDocument::capture(&data, EncodeOptions::EVERYTHING, &registry).unwrap();
        let value = doc.to_value().unwrap();
        assert_eq!(value["content"]["location"]["provider"]["tag"], "memory");
        assert_eq!(value["content"]["focused"], "a");
        assert_eq!(value["view"]["view_mode"], "full");

        let restored = PanelStateDocument::from_value(&value).unwrap();
        assert_eq!(restored, doc);

        let mut other = PanelData::new();
        restored.apply_options(&mut other);
        assert_eq!(other.view_mode, ViewMode::Full);
        assert_eq!(other.sort_config, data.sort_config);
        assert!(!other.show_hidden);
    }

    #[test]
    fn test_malformed_document() {
        assert!(PanelStateDocument::from_value(&serde_json::json!({"view": {"view_mode": 3}})).is_err());
        assert!(PanelStateDocument::from_value(&serde_json::json!("panel")).is_err());
    }
}
