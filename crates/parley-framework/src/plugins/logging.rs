//! Request and response logging.
//!
//! Enabled by `logging: true` or a structured `logging` section. Payloads are
//! logged through `tracing` at `INFO` with masked fields replaced by `"***"`.

use parley_core::{ParleyResult, stage};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::BasicLoggingConfig;
use crate::conversation::Conversation;
use crate::plugin::{InstallContext, Plugin};

const MASK: &str = "***";

#[derive(Debug, Clone, Default)]
pub struct BasicLoggingPlugin {
    config: BasicLoggingConfig,
}

impl BasicLoggingPlugin {
    pub fn new(config: BasicLoggingConfig) -> Self {
        Self { config }
    }
}

impl Plugin for BasicLoggingPlugin {
    fn name(&self) -> &str {
        "BasicLoggingPlugin"
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn install(&self, ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
        let config: BasicLoggingConfig = ctx.config_as()?;
        if config.request {
            let mask = config.mask.clone();
            let pretty = config.pretty;
            ctx.hook(stage::REQUEST_START, move |c| {
                let mask = mask.clone();
                Box::pin(async move {
                    let payload = render(c.request(), &mask, pretty);
                    info!(platform = %c.platform(), "Request: {payload}");
                    Ok(())
                })
            })?;
        }
        if config.response {
            let mask = config.mask;
            let pretty = config.pretty;
            ctx.hook(stage::RESPONSE_END, move |c: &mut Conversation| {
                let mask = mask.clone();
                Box::pin(async move {
                    match c.response() {
                        Some(response) => {
                            let payload = render(response, &mask, pretty);
                            info!(platform = %c.platform(), "Response: {payload}");
                        }
                        None => info!(platform = %c.platform(), "Response: <none>"),
                    }
                    Ok(())
                })
            })?;
        }
        Ok(())
    }
}

/// Serializes `payload` with every pointer in `mask` replaced.
pub fn render(payload: &Value, mask: &[String], pretty: bool) -> String {
    let mut copy = payload.clone();
    for pointer in mask {
        match copy.pointer_mut(pointer) {
            Some(value) => *value = Value::String(MASK.to_string()),
            None if !pointer.starts_with('/') => {
                warn!(pointer = %pointer, "Mask entries must be JSON pointers");
            }
            None => {}
        }
    }
    let rendered = if pretty {
        serde_json::to_string_pretty(&copy)
    } else {
        serde_json::to_string(&copy)
    };
    rendered.unwrap_or_else(|_| copy.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::plugin::{PluginHandle, PluginRegistry};

    #[test]
    fn test_render_masks_pointers() {
        let payload = json!({ "user": { "token": "secret", "id": "u1" }, "list": [1, 2] });
        let mask = vec!["/user/token".to_string(), "/list/1".to_string(), "/missing".to_string()];
        let out = render(&payload, &mask, false);
        assert_eq!(
            out,
            r#"{"list":[1,"***"],"user":{"id":"u1","token":"***"}}"#
        );
        assert!(render(&payload, &[], true).contains('\n'));
    }

    #[test]
    fn test_hooks_follow_config() {
        let mut registry = PluginRegistry::default();
        registry
            .register(
                PluginHandle::new(BasicLoggingPlugin::default())
                    .with_config(json!({ "response": false })),
            )
            .unwrap();
        let middleware = registry.middleware();
        assert_eq!(middleware.handler_count(stage::REQUEST_START), Some(1));
        assert_eq!(middleware.handler_count(stage::RESPONSE_END), Some(0));
    }

    #[test]
    fn test_skipped_in_test_mode_by_default() {
        let mut registry = PluginRegistry::default();
        registry.set_test_mode(true);
        let installed = registry
            .register(PluginHandle::new(BasicLoggingPlugin::default()))
            .unwrap();
        assert!(!installed);
    }
}
