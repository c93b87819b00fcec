//! Daemon configuration.
//!
//! The configuration is loaded from a JSON file whose path is passed on the
//! command line (`--config <path>`).  It declares the object graph the
//! daemon starts with (groups, layouts, screens with their bars and
//! widgets) and the key-binding tree served by `display_kb`.
//!
//! # Example
//!
//! ```json
//! {
//!   "groups": ["a", "b", "c"],
//!   "layouts": ["stack", "max"],
//!   "screens": [
//!     {"x": 0, "y": 0, "width": 800, "height": 600,
//!      "bars": {"bottom": {"size": 20, "widgets": [{"name": "clock"}]}}}
//!   ],
//!   "keys": [
//!     {"mods": ["mod4"], "key": "Return",
//!      "commands": [{"name": "spawn", "args": ["xterm"]}]}
//!   ]
//! }
//! ```

use crate::keys::KeyEntry;
use crate::object::Edge;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level configuration.
///
/// Every field is optional; a minimal `{}` file is valid and all sections
/// fall back to their compiled-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Group names, in order.  The first groups are shown on the screens.
    pub groups: Vec<String>,
    /// Layout names instantiated per group, in cycling order.
    pub layouts: Vec<String>,
    /// Screen geometry and attached bars.
    pub screens: Vec<ScreenConfig>,
    /// Key-binding tree.
    pub keys: Vec<KeyEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            groups: ["a", "b", "c", "d"].map(String::from).to_vec(),
            layouts: vec!["stack".into()],
            screens: vec![ScreenConfig::default()],
            keys: Vec::new(),
        }
    }
}

/// One screen: its geometry on the virtual desktop and its bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Bars keyed by the edge they attach to.
    pub bars: BTreeMap<Edge, BarConfig>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 800,
            height: 600,
            bars: BTreeMap::new(),
        }
    }
}

/// A bar attached to one screen edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    /// Thickness in pixels: height for horizontal bars, width for vertical
    /// ones.
    pub size: u32,
    /// Widgets hosted by the bar, in display order.
    pub widgets: Vec<WidgetConfig>,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            size: 24,
            widgets: Vec::new(),
        }
    }
}

/// A named widget inside a bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub name: String,
    #[serde(default)]
    pub text: String,
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
