//! The core platform plugin.

use std::sync::OnceLock;

use parley_core::{ParleyResult, stage};
use parley_framework::{Conversation, InstallContext, Platform, Plugin};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CorePlatformConfig;
use crate::model::{CoreRequest, CoreResponse, ResponseSession};

/// Platform adapter for the generic JSON format in [`crate::model`].
///
/// Its handlers only act on conversations this platform created, so several
/// platforms can be registered side by side.
#[derive(Debug, Default)]
pub struct CorePlatform {
    config: CorePlatformConfig,
    installed: OnceLock<CorePlatformConfig>,
}

impl CorePlatform {
    pub fn new(config: CorePlatformConfig) -> Self {
        Self {
            config,
            installed: OnceLock::new(),
        }
    }

    /// Effective settings: the merged config once installed, the
    /// constructor's before.
    pub fn settings(&self) -> &CorePlatformConfig {
        self.installed.get().unwrap_or(&self.config)
    }
}

impl Plugin for CorePlatform {
    fn name(&self) -> &str {
        "CorePlatform"
    }

    fn default_config(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }

    fn install(&self, ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
        let config: CorePlatformConfig = ctx.config_as()?;
        if let Err(rejected) = self.installed.set(config)
            && &rejected != self.settings()
        {
            warn!(
                platform = %self.settings().platform,
                "CorePlatform instance installed twice, keeping its first config"
            );
        }
        let config = self.settings().clone();

        let platform = config.platform.clone();
        let default_locale = config.default_locale.clone();
        ctx.hook(stage::REQUEST_START, move |c| {
            let platform = platform.clone();
            let default_locale = default_locale.clone();
            Box::pin(async move {
                if c.platform() == platform {
                    read_request(c, default_locale.as_deref())?;
                }
                Ok(())
            })
        })?;

        let platform = config.platform;
        let listen_by_default = config.listen_by_default;
        ctx.hook(stage::RESPONSE_OUTPUT, move |c| {
            let platform = platform.clone();
            Box::pin(async move {
                if c.platform() == platform {
                    write_response(c, listen_by_default)?;
                }
                Ok(())
            })
        })
    }

    fn as_platform(&self) -> Option<&dyn Platform> {
        Some(self)
    }
}

impl Platform for CorePlatform {
    fn platform_name(&self) -> &str {
        &self.settings().platform
    }

    fn is_request_relevant(&self, request: &Value) -> bool {
        request.get("platform").and_then(Value::as_str) == Some(self.platform_name())
    }
}

/// Fills input, session and user from the raw payload.
fn read_request(conversation: &mut Conversation, default_locale: Option<&str>) -> ParleyResult<()> {
    let request: CoreRequest = serde_json::from_value(conversation.request().clone())?;

    let mut input = request.input;
    if input.locale.is_none() {
        input.locale = request.locale.or_else(|| default_locale.map(String::from));
    }

    let mut session = request.session;
    if session.id.is_none() {
        session.id = Some(Uuid::new_v4().to_string());
        session.is_new = true;
    }

    debug!(
        request_id = ?request.request_id,
        input_type = ?input.input_type,
        intent = ?input.intent,
        session = ?session.id,
        new_session = session.is_new,
        "Core request parsed"
    );
    conversation.input = input;
    conversation.session = session;
    conversation.user = request.user;
    Ok(())
}

/// Renders the output templates into the response payload.
fn write_response(conversation: &mut Conversation, listen_by_default: bool) -> ParleyResult<()> {
    let listen = conversation
        .output
        .iter()
        .rev()
        .find_map(|o| o.listen)
        .unwrap_or(listen_by_default);

    let response = CoreResponse {
        platform: conversation.platform().to_string(),
        output: conversation.output.clone(),
        session: ResponseSession::from_session(&conversation.session, !listen),
        user: conversation.user.clone(),
    };
    conversation.set_response(serde_json::to_value(&response)?);
    Ok(())
}
