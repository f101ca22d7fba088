//! Internationalization interface.
//!
//! The engine consumes i18n only as "initialize once, then translate". The
//! default [`ResourceI18n`] backend reads nested resources from configuration:
//!
//! ```yaml
//! i18n:
//!   fallback_locale: en
//!   resources:
//!     en:
//!       translation:
//!         WELCOME: "Hello {{name}}!"
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::error::{ParleyError, ParleyResult};

/// i18n configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct I18nConfig {
    /// Locale used when the requested one has no entry.
    #[serde(default = "default_fallback_locale")]
    pub fallback_locale: String,

    /// Namespace inside each locale that holds the keys.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Resources keyed by locale.
    #[serde(default)]
    pub resources: Map<String, Value>,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            fallback_locale: default_fallback_locale(),
            namespace: default_namespace(),
            resources: Map::new(),
        }
    }
}

fn default_fallback_locale() -> String {
    "en".to_string()
}

fn default_namespace() -> String {
    "translation".to_string()
}

/// Translation backend.
#[async_trait]
pub trait I18n: Send + Sync {
    /// One-time setup from configuration.
    async fn initialize(&self, config: &I18nConfig) -> ParleyResult<()>;

    /// Translates `key` for `locale`, interpolating `args`.
    fn translate(&self, key: &str, locale: &str, args: &Map<String, Value>) -> String;
}

/// Configuration-backed translation with `{{placeholder}}` interpolation.
///
/// Lookup order: exact locale (`en-US`), its language (`en`), then the
/// fallback locale. A missing key translates to the key itself.
#[derive(Debug, Default)]
pub struct ResourceI18n {
    config: RwLock<I18nConfig>,
}

impl ResourceI18n {
    /// Creates an empty backend; call [`I18n::initialize`] to load resources.
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, key: &str, locale: &str) -> Option<String> {
        let config = self.config.read();
        let language = locale.split(['-', '_']).next().unwrap_or(locale);
        [locale, language, config.fallback_locale.as_str()]
            .into_iter()
            .find_map(|candidate| {
                let root = config.resources.get(candidate)?;
                let root = root.get(&config.namespace).unwrap_or(root);
                let value = key
                    .split('.')
                    .try_fold(root, |node, segment| node.get(segment))?;
                match value {
                    Value::String(s) => Some(s.clone()),
                    Value::Array(items) => items.iter().find_map(|v| v.as_str().map(String::from)),
                    _ => None,
                }
            })
    }
}

#[async_trait]
impl I18n for ResourceI18n {
    async fn initialize(&self, config: &I18nConfig) -> ParleyResult<()> {
        if config.fallback_locale.is_empty() {
            return Err(ParleyError::Config(
                "i18n fallback locale must not be empty".to_string(),
            ));
        }
        *self.config.write() = config.clone();
        debug!(
            locales = config.resources.len(),
            fallback = %config.fallback_locale,
            "i18n resources loaded"
        );
        Ok(())
    }

    fn translate(&self, key: &str, locale: &str, args: &Map<String, Value>) -> String {
        let Some(template) = self.lookup(key, locale) else {
            trace!(key, locale, "Missing translation");
            return key.to_string();
        };
        interpolate(&template, args)
    }
}

/// Replaces `{{name}}` placeholders with values from `args`.
///
/// Unknown placeholders are left as they are.
pub fn interpolate(template: &str, args: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        let name = rest[start + 2..start + 2 + len].trim();
        out.push_str(&rest[..start]);
        match args.get(name) {
            Some(Value::String(s)) => out.push_str(s),
            Some(other) => out.push_str(&other.to_string()),
            None => out.push_str(&rest[start..start + 4 + len]),
        }
        rest = &rest[start + 4 + len..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config() -> I18nConfig {
        serde_json::from_value(json!({
            "fallback_locale": "en",
            "resources": {
                "en": { "translation": {
                    "WELCOME": "Hello {{ name }}!",
                    "nested": { "BYE": ["Bye", "See you"] }
                }},
                "de": { "translation": { "WELCOME": "Hallo {{name}}!" } }
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_translate_with_locale_chain() {
        let i18n = ResourceI18n::new();
        i18n.initialize(&config()).await.unwrap();

        let mut args = Map::new();
        args.insert("name".into(), json!("Ada"));

        assert_eq!(i18n.translate("WELCOME", "de-DE", &args), "Hallo Ada!");
        assert_eq!(i18n.translate("WELCOME", "fr", &args), "Hello Ada!");
        assert_eq!(i18n.translate("nested.BYE", "en-US", &args), "Bye");
        assert_eq!(i18n.translate("MISSING", "en", &args), "MISSING");
    }

    #[test]
    fn test_interpolate_keeps_unknown_placeholders() {
        let mut args = Map::new();
        args.insert("count".into(), json!(3));
        assert_eq!(
            interpolate("{{count}} of {{total}} {{", &args),
            "3 of {{total}} {{"
        );
    }

    #[tokio::test]
    async fn test_empty_fallback_is_rejected() {
        let i18n = ResourceI18n::new();
        let config = I18nConfig {
            fallback_locale: String::new(),
            ..I18nConfig::default()
        };
        assert!(i18n.initialize(&config).await.is_err());
    }
}
