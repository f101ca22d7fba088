//! Configuration for the core platform.
//!
//! Read from the `plugin.CorePlatform` section of the app configuration:
//!
//! ```yaml
//! plugin:
//!   CorePlatform:
//!     platform: web
//!     default_locale: de
//! ```

use serde::{Deserialize, Serialize};

/// Core platform configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorePlatformConfig {
    /// Value of the payload's `platform` field this adapter accepts.
    pub platform: String,

    /// Locale used when neither the input nor the request carries one.
    pub default_locale: Option<String>,

    /// Whether the session stays open when no output says otherwise.
    pub listen_by_default: bool,
}

impl Default for CorePlatformConfig {
    fn default() -> Self {
        Self {
            platform: "core".to_string(),
            default_locale: None,
            listen_by_default: false,
        }
    }
}

impl CorePlatformConfig {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            ..Default::default()
        }
    }
}
