//! Application configuration schema.
//!
//! [`AppConfig`] is the configuration every request snapshot carries. It is
//! deliberately open: keys the engine does not know land in
//! [`extra`](AppConfig::extra) and survive [`merge`](AppConfig::merge) calls,
//! so plugins can read their own top-level sections.

use std::collections::HashMap;

use parley_core::{I18nConfig, ParleyResult, deep_merge};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Keys that describe registrations rather than settings.
const REGISTRATION_KEYS: [&str; 2] = ["plugins", "components"];

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Skips plugins whose config sets `skip_tests: true`.
    #[serde(default)]
    pub test_mode: bool,

    /// Translation resources.
    #[serde(default)]
    pub i18n: I18nConfig,

    /// Built-in request/response logging.
    #[serde(default)]
    pub logging: LoggingOption,

    /// Intent routing rules.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Per-plugin config overrides, keyed by plugin name.
    #[serde(default)]
    pub plugin: Map<String, Value>,

    /// Any other top-level keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppConfig {
    /// Deep-merges a partial configuration over this one.
    ///
    /// Objects merge recursively, arrays and scalars are replaced. Plugin and
    /// component lists are registrations, not settings, and are ignored.
    pub fn merge(&mut self, partial: Value) -> ParleyResult<()> {
        let partial = match partial {
            Value::Object(mut map) => {
                for key in REGISTRATION_KEYS {
                    if map.remove(key).is_some() {
                        warn!(key, "Ignoring registration list in configuration merge");
                    }
                }
                Value::Object(map)
            }
            other => other,
        };

        let mut current = serde_json::to_value(&*self)?;
        deep_merge(&mut current, partial);
        *self = serde_json::from_value(current)?;
        Ok(())
    }

    /// Returns the override section for `plugin`, if any.
    pub fn plugin_override(&self, plugin: &str) -> Option<&Value> {
        self.plugin.get(plugin)
    }

    /// Returns the built-in logging config when logging is enabled.
    pub fn basic_logging(&self) -> Option<BasicLoggingConfig> {
        match &self.logging {
            LoggingOption::Enabled(true) => Some(BasicLoggingConfig::default()),
            LoggingOption::Enabled(false) => None,
            LoggingOption::Config(config) if config.enabled => Some(config.clone()),
            LoggingOption::Config(_) => None,
        }
    }
}

/// `logging: true` shorthand or a structured section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoggingOption {
    /// Enables or disables logging with default settings.
    Enabled(bool),
    /// Logging with explicit settings.
    Config(BasicLoggingConfig),
}

impl Default for LoggingOption {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

/// Settings of the built-in request/response logging plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicLoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log the raw request at `request.start`.
    #[serde(default = "default_true")]
    pub request: bool,

    /// Log the response at `response.end`.
    #[serde(default = "default_true")]
    pub response: bool,

    /// Pretty-print JSON payloads.
    #[serde(default)]
    pub pretty: bool,

    /// JSON pointers (e.g. `/user/accessToken`) replaced by `"***"` in logs.
    #[serde(default)]
    pub mask: Vec<String>,

    /// Skip this plugin when the app runs in test mode.
    #[serde(default = "default_true")]
    pub skip_tests: bool,
}

impl Default for BasicLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request: true,
            response: true,
            pretty: false,
            mask: Vec::new(),
            skip_tests: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Intent routing rules used by the router plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Rewrites an incoming intent name before routing.
    #[serde(default)]
    pub intent_map: HashMap<String, String>,

    /// Intents that never fall back to an `UNHANDLED` handler.
    #[serde(default)]
    pub intents_to_skip_unhandled: Vec<String>,
}

impl RoutingConfig {
    /// Applies the intent map to `intent`.
    pub fn map_intent<'a>(&'a self, intent: &'a str) -> &'a str {
        self.intent_map.get(intent).map(String::as_str).unwrap_or(intent)
    }

    /// Returns `true` if `intent` may fall back to `UNHANDLED`.
    pub fn allows_unhandled(&self, intent: &str) -> bool {
        !self.intents_to_skip_unhandled.iter().any(|i| i == intent)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_merge_objects_recursively() {
        let mut config = AppConfig::default();
        config.merge(json!({ "a": { "x": 1 } })).unwrap();
        config.merge(json!({ "a": { "y": 2 } })).unwrap();
        assert_eq!(config.extra.get("a"), Some(&json!({ "x": 1, "y": 2 })));
    }

    #[test]
    fn test_merge_replaces_arrays_and_keeps_known_sections() {
        let mut config = AppConfig::default();
        config
            .merge(json!({
                "routing": { "intents_to_skip_unhandled": ["A", "B"] },
                "plugin": { "Router": { "level": 1 } }
            }))
            .unwrap();
        config
            .merge(json!({
                "routing": { "intents_to_skip_unhandled": ["C"] },
                "plugin": { "Router": { "other": true } }
            }))
            .unwrap();

        assert_eq!(config.routing.intents_to_skip_unhandled, vec!["C"]);
        assert_eq!(
            config.plugin_override("Router"),
            Some(&json!({ "level": 1, "other": true }))
        );
    }

    #[test]
    fn test_merge_ignores_registration_lists() {
        let mut config = AppConfig::default();
        config
            .merge(json!({ "plugins": [1, 2], "components": [], "keep": 1 }))
            .unwrap();
        assert!(!config.extra.contains_key("plugins"));
        assert!(!config.extra.contains_key("components"));
        assert_eq!(config.extra.get("keep"), Some(&json!(1)));
    }

    #[test]
    fn test_logging_shorthand_and_structured() {
        let config: AppConfig = serde_json::from_value(json!({ "logging": true })).unwrap();
        assert_eq!(config.basic_logging(), Some(BasicLoggingConfig::default()));

        let config: AppConfig =
            serde_json::from_value(json!({ "logging": { "pretty": true, "mask": ["/user"] } }))
                .unwrap();
        let logging = config.basic_logging().unwrap();
        assert!(logging.pretty);
        assert_eq!(logging.mask, vec!["/user"]);

        assert_eq!(AppConfig::default().basic_logging(), None);
    }

    #[test]
    fn test_routing_helpers() {
        let routing = RoutingConfig {
            intent_map: HashMap::from([("AMAZON.StopIntent".into(), "END".into())]),
            intents_to_skip_unhandled: vec!["HelpIntent".into()],
        };
        assert_eq!(routing.map_intent("AMAZON.StopIntent"), "END");
        assert_eq!(routing.map_intent("YesIntent"), "YesIntent");
        assert!(!routing.allows_unhandled("HelpIntent"));
        assert!(routing.allows_unhandled("YesIntent"));
    }
}
