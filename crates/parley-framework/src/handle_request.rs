//! Request context.
//!
//! A [`HandleRequest`] is created for every inbound request from an
//! [`AppSnapshot`]. It owns its own copy of the app's configuration, plugin
//! registry and component tree, so nothing a request changes leaks into the
//! app or into concurrent requests, and nothing the app changes after the
//! snapshot is visible to the request.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use parley_core::{
    BoxedTransport, I18n, LifecyclePhase, MiddlewareCollection, ParleyError, ParleyResult,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::component::ComponentTree;
use crate::config::AppConfig;
use crate::conversation::Conversation;
use crate::platform::Platform;
use crate::plugin::{PipelineHandler, Plugin, PluginRegistry, PluginState};
use crate::usable::{Usable, register_usables};

/// Everything a request copies from the app when it starts.
pub struct AppSnapshot {
    pub config: AppConfig,
    pub plugins: PluginRegistry,
    pub components: ComponentTree,
    pub i18n: Arc<dyn I18n>,
}

/// Per-request state handed to plugins and, through the conversation, to
/// handlers.
pub struct HandleRequest {
    config: AppConfig,
    plugins: PluginRegistry,
    components: ComponentTree,
    i18n: Arc<dyn I18n>,
    platform: Option<String>,
    server: BoxedTransport,
}

impl HandleRequest {
    pub fn new(snapshot: AppSnapshot, server: BoxedTransport) -> Self {
        Self {
            config: snapshot.config,
            plugins: snapshot.plugins,
            components: snapshot.components,
            i18n: snapshot.i18n,
            platform: None,
            server,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    /// Effective config of a registered plugin.
    pub fn plugin_config(&self, name: &str) -> Option<&Value> {
        self.plugins.find(name).map(|e| e.config())
    }

    pub fn components(&self) -> &ComponentTree {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentTree {
        &mut self.components
    }

    /// The request's middleware collection.
    pub fn middleware(&self) -> &MiddlewareCollection<Conversation> {
        self.plugins.middleware()
    }

    /// Registers plugins and components for this request only.
    pub fn register<I>(&mut self, usables: I) -> ParleyResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Usable>,
    {
        register_usables(&self.config, &mut self.plugins, &mut self.components, usables)
    }

    /// Adds a handler at `stage` for this request only.
    pub fn hook<F>(&self, stage: &str, f: F) -> ParleyResult<PipelineHandler>
    where
        F: for<'a> Fn(&'a mut Conversation) -> BoxFuture<'a, ParleyResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.middleware().on(stage, f)
    }

    /// Runs every plugin's `mount` hook in registration order.
    pub async fn mount(&mut self) -> ParleyResult<()> {
        self.run_lifecycle(LifecyclePhase::Mount).await
    }

    /// Runs every plugin's `dismount` hook in registration order.
    pub async fn dismount(&mut self) -> ParleyResult<()> {
        self.run_lifecycle(LifecyclePhase::Dismount).await
    }

    async fn run_lifecycle(&mut self, phase: LifecyclePhase) -> ParleyResult<()> {
        for target in self.plugins.lifecycle_targets() {
            let (result, state) = match phase {
                LifecyclePhase::Dismount => {
                    (target.plugin.dismount(self).await, PluginState::Dismounted)
                }
                _ => (target.plugin.mount(self).await, PluginState::Mounted),
            };
            result.map_err(|e| ParleyError::lifecycle(&target.name, phase, e))?;
            self.plugins.set_state(&target.name, state);
        }
        debug!(phase = %phase, plugins = self.plugins.len(), "Plugin lifecycle completed");
        Ok(())
    }

    /// Prevents every handler of this request that has not started yet.
    pub fn stop_middleware_execution(&self) {
        self.middleware().clear();
    }

    /// Binds the first platform plugin that recognizes the payload.
    pub fn resolve_platform(&mut self) -> ParleyResult<Arc<dyn Plugin>> {
        let request = self.server.request_object();
        let (name, plugin) = self
            .plugins
            .entries()
            .iter()
            .find(|e| {
                e.plugin()
                    .as_platform()
                    .is_some_and(|p| p.is_request_relevant(request))
            })
            .map(|e| (e.name().to_string(), Arc::clone(e.plugin())))
            .ok_or(ParleyError::NoMatchingPlatform)?;
        debug!(platform = %name, "Platform resolved");
        self.platform = Some(name);
        Ok(plugin)
    }

    /// Name of the bound platform plugin.
    pub fn platform_name(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// The bound platform.
    pub fn platform(&self) -> Option<&dyn Platform> {
        let name = self.platform.as_deref()?;
        self.plugins.get(name)?.plugin().as_platform()
    }

    pub fn server(&self) -> &BoxedTransport {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut BoxedTransport {
        &mut self.server
    }

    pub fn i18n(&self) -> &Arc<dyn I18n> {
        &self.i18n
    }

    pub fn translate(&self, key: &str, locale: &str, args: &Map<String, Value>) -> String {
        self.i18n.translate(key, locale, args)
    }
}

impl fmt::Debug for HandleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRequest")
            .field("transport", &self.server.name())
            .field("platform", &self.platform)
            .field("plugins", &self.plugins.len())
            .field("components", &self.components.len())
            .finish_non_exhaustive()
    }
}
