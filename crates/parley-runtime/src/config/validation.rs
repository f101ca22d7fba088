//! Configuration validation utilities.

use parley_framework::{AppConfig, RoutingConfig};

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, ParleyConfig, ServerConfig, TelemetryConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &ParleyConfig) -> ConfigResult<()> {
    validate_telemetry(&config.telemetry)?;
    validate_server(&config.server)?;
    validate_app(&config.app)?;
    Ok(())
}

fn validate_telemetry(telemetry: &TelemetryConfig) -> ConfigResult<()> {
    if telemetry.output == LogOutput::File && telemetry.file_path.is_none() {
        return Err(ConfigError::missing_field("telemetry.file_path"));
    }
    if let Some(module) = telemetry.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter module name cannot be empty (got {module:?})"
        )));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> ConfigResult<()> {
    if server.host.is_empty() {
        return Err(ConfigError::missing_field("server.host"));
    }
    if !server.path.starts_with('/') {
        return Err(ConfigError::validation(format!(
            "Server path must start with '/': {}",
            server.path
        )));
    }
    Ok(())
}

/// Validates the app section.
pub fn validate_app(app: &AppConfig) -> ConfigResult<()> {
    if app.i18n.fallback_locale.trim().is_empty() {
        return Err(ConfigError::missing_field("i18n.fallback_locale"));
    }
    validate_routing(&app.routing)?;
    for (name, section) in &app.plugin {
        if !section.is_object() {
            return Err(ConfigError::validation(format!(
                "Plugin config for '{name}' must be a table"
            )));
        }
    }
    Ok(())
}

fn validate_routing(routing: &RoutingConfig) -> ConfigResult<()> {
    for (from, to) in &routing.intent_map {
        if from.is_empty() || to.is_empty() {
            return Err(ConfigError::validation(format!(
                "Intent map entries cannot be empty: {from:?} -> {to:?}"
            )));
        }
    }
    if routing.intents_to_skip_unhandled.iter().any(String::is_empty) {
        return Err(ConfigError::validation(
            "intents_to_skip_unhandled cannot contain empty names",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ParleyConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_empty_intent_mapping() {
        let mut config = ParleyConfig::default();
        config.app.routing.intent_map.insert("Stop".into(), String::new());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = ParleyConfig::default();
        config.telemetry.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { field }) if field == "telemetry.file_path"
        ));
    }

    #[test]
    fn test_plugin_section_must_be_table() {
        let mut config = ParleyConfig::default();
        config.app.plugin.insert("RouterPlugin".into(), json!(3));
        assert!(validate_config(&config).is_err());

        config.server.path = "webhook".into();
        config.app.plugin.clear();
        assert!(validate_config(&config).is_err());
    }
}
