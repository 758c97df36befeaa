//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::ViewEngine`].
///
/// All fields have serde defaults so partial config files deserialize
/// cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Dump generated program text and rendered output at debug level.
    #[serde(default)]
    pub debug: bool,

    /// Layout applied when a model carries no `layout` field. Empty
    /// means no implicit layout.
    #[serde(default)]
    pub default_layout: String,

    /// Directory layouts and views are resolved against.
    #[serde(default = "default_views_dir")]
    pub views_dir: String,

    /// Directory partial views are resolved against.
    #[serde(default = "default_partial_dir")]
    pub partial_dir: String,

    /// Extension appended to view paths that have none.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Production mode: compiled templates are cached by path and never
    /// recompiled. Off by default so edits show up on the next render.
    #[serde(default)]
    pub production: bool,
}

fn default_views_dir() -> String {
    "views".to_string()
}

fn default_partial_dir() -> String {
    "views/partials".to_string()
}

fn default_extension() -> String {
    "html".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            debug: false,
            default_layout: String::new(),
            views_dir: default_views_dir(),
            partial_dir: default_partial_dir(),
            extension: default_extension(),
            production: false,
        }
    }
}
