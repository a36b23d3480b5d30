//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::AppResult;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Navigation behaviour
    pub navigation: NavigationConfig,
    /// Display settings
    pub display: DisplayConfig,
    /// Sorting settings
    pub sorting: SortingConfig,
    /// Log output
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// How long a delayed focus request waits for its entry to appear
    pub delayed_focus_timeout_ms: u64,
    /// Directory used when recovery runs out of ancestors (empty = $HOME)
    pub home_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Default view mode: "brief" or "full"
    pub view_mode: String,
    /// Show hidden files (starting with .)
    pub show_hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingConfig {
    /// Sort field: "name", "extension", "size", "modified", "unsorted"
    pub field: String,
    /// Sort direction: "ascending" or "descending"
    pub direction: String,
    /// Always show directories before files
    pub dirs_first: bool,
    /// Sort uppercase-first names before lowercase-first names
    pub uppercase_first: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when RUST_LOG is not set
    pub filter: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            delayed_focus_timeout_ms: 500,
            home_path: String::new(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            view_mode: "brief".to_string(),
            show_hidden: true,
        }
    }
}

impl Default for SortingConfig {
    fn default() -> Self {
        Self {
            field: "name".to_string(),
            direction: "ascending".to_string(),
            dirs_first: true,
            uppercase_first: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl NavigationConfig {
    pub fn delayed_focus_timeout(&self) -> Duration {
        Duration::from_millis(self.delayed_focus_timeout_ms)
    }
}

/// Get the config directory path for the current platform
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        // Linux: ~/.config/bark
        dirs_next().map(|p| p.join("bark"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config/bark"))
    }

    #[cfg(target_os = "windows")]
    {
        // Windows: %APPDATA%\bark
        std::env::var("APPDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("bark"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config/bark"))
    }
}

#[cfg(target_os = "linux")]
fn dirs_next() -> Option<PathBuf> {
    // Check XDG_CONFIG_HOME first, then fall back to ~/.config
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
}

/// Get the config file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("panel.toml"))
}

/// Get the saved panel state path
pub fn panel_state_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("panel-state.json"))
}

/// Load the saved panel state, if any
pub fn load_panel_state() -> Option<serde_json::Value> {
    let path = panel_state_file()?;
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable panel state");
            None
        }
    }
}

/// Save panel state next to the config file
pub fn save_panel_state(state: &serde_json::Value) -> AppResult<()> {
    let Some(path) = panel_state_file() else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&path, serde_json::to_string_pretty(state)?)?;
    Ok(())
}

/// Default configuration file content with comments
fn default_config() -> &'static str {
    r##"# Bark panel configuration

[navigation]
# How long (ms) a "focus this entry once it appears" request stays alive
delayed_focus_timeout_ms = 500
# Where to go when the current directory disappears and no parent is readable
# (empty = home directory)
home_path = ""

[display]
# "brief" or "full"
view_mode = "brief"
show_hidden = true

[sorting]
# "name", "extension", "size", "modified", "unsorted"
field = "name"
# "ascending" or "descending"
direction = "ascending"
dirs_first = true
uppercase_first = true

[logging]
# Used when RUST_LOG is not set, e.g. "bark_panel=debug"
filter = "warn"
"##
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Self {
        let Some(config_path) = config_file() else {
            tracing::warn!("could not determine config directory");
            return Config::default();
        };

        // Create config directory if it doesn't exist
        if let Some(config_dir) = config_path.parent()
            && !config_dir.exists()
                && let Err(e) = fs::create_dir_all(config_dir) {
                    tracing::warn!(error = %e, "could not create config directory");
                    return Config::default();
                }

        // Create default config if it doesn't exist
        if !config_path.exists()
            && let Err(e) = fs::write(&config_path, default_config()) {
                tracing::warn!(error = %e, "could not create config file");
                return Config::default();
            }

        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "using default configuration");
                Config::default()
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> AppResult<Self> {
        Ok(toml_edit::de::from_str(content)?)
    }
}
