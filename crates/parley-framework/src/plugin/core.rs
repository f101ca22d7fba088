use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use parley_core::{MiddlewareCollection, ParleyError, ParleyResult, StageHandler};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::conversation::Conversation;
use crate::handle_request::HandleRequest;
use crate::platform::Platform;

/// A stage handler running against the conversation.
pub type PipelineHandler = StageHandler<Conversation>;

/// Returns the last path segment of a type name, without generics.
///
/// `my_app::plugins::RouterPlugin<T>` becomes `RouterPlugin`.
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ─── PluginState ──────────────────────────────────────────────────────────────

/// Lifecycle state of a registered plugin.
///
/// `Installed` is reached at registration; `Mounted` and `Dismounted`
/// alternate per request on the request's own registry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Installed,
    Mounted,
    Dismounted,
}

// ─── Plugin ───────────────────────────────────────────────────────────────────

/// A named, configurable unit that contributes stage handlers.
///
/// # Example
///
/// ```rust,ignore
/// struct Greeter;
///
/// #[async_trait]
/// impl Plugin for Greeter {
///     fn default_config(&self) -> Value {
///         json!({ "greeting": "Hello" })
///     }
///
///     fn install(&self, ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
///         let greeting = ctx.config()["greeting"].as_str().unwrap_or("Hi").to_string();
///         ctx.hook(stage::DIALOGUE_END, move |conversation| {
///             let greeting = greeting.clone();
///             Box::pin(async move {
///                 conversation.tell(greeting);
///                 Ok(())
///             })
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Registry key. Defaults to the implementing type's name.
    fn name(&self) -> &str {
        short_type_name(type_name::<Self>())
    }

    /// Config the caller's partial config is merged over.
    fn default_config(&self) -> Value {
        Value::Object(Map::new())
    }

    /// Stages this plugin adds to its owner's catalog.
    fn stages(&self) -> Vec<String> {
        Vec::new()
    }

    /// One-time registration hook. Contributes stage handlers and nested
    /// plugins through `ctx`.
    fn install(&self, _ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
        Ok(())
    }

    /// One-time async setup when the app initializes.
    async fn initialize(&self, _ctx: &PluginContext<'_>) -> ParleyResult<()> {
        Ok(())
    }

    /// Runs before every request.
    async fn mount(&self, _request: &mut HandleRequest) -> ParleyResult<()> {
        Ok(())
    }

    /// Runs after every successful request.
    async fn dismount(&self, _request: &mut HandleRequest) -> ParleyResult<()> {
        Ok(())
    }

    /// Returns the platform capability of a platform adapter plugin.
    fn as_platform(&self) -> Option<&dyn Platform> {
        None
    }
}

// ─── PluginHandle ─────────────────────────────────────────────────────────────

/// A plugin instance ready to be registered, with its partial config.
#[derive(Clone)]
pub struct PluginHandle {
    pub(crate) plugin: Arc<dyn Plugin>,
    pub(crate) type_id: TypeId,
    pub(crate) config: Value,
}

impl PluginHandle {
    /// Wraps a plugin with an empty partial config.
    pub fn new<P: Plugin>(plugin: P) -> Self {
        Self {
            plugin: Arc::new(plugin),
            type_id: TypeId::of::<P>(),
            config: Value::Object(Map::new()),
        }
    }

    /// Sets the partial config merged over the plugin's default.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Returns the plugin's registry key.
    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    /// Returns the partial config.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Merges `overlay` over the partial config.
    pub fn merge_config(&mut self, overlay: Value) {
        parley_core::deep_merge(&mut self.config, overlay);
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name())
            .field("config", &self.config)
            .finish()
    }
}

// ─── InstallContext ───────────────────────────────────────────────────────────

/// What a plugin's `install` hook may contribute.
///
/// Contributions are validated against the owner's stage catalog immediately
/// but only folded into the owner's collection once the whole plugin tree
/// installed successfully.
pub struct InstallContext<'a> {
    plugin: &'a str,
    config: &'a Value,
    middleware: &'a MiddlewareCollection<Conversation>,
    pub(crate) contributions: Vec<(String, PipelineHandler)>,
    pub(crate) children: Vec<PluginHandle>,
}

impl<'a> InstallContext<'a> {
    pub(crate) fn new(
        plugin: &'a str,
        config: &'a Value,
        middleware: &'a MiddlewareCollection<Conversation>,
    ) -> Self {
        Self {
            plugin,
            config,
            middleware,
            contributions: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Name of the plugin being installed.
    pub fn plugin_name(&self) -> &str {
        self.plugin
    }

    /// The plugin's effective config (default merged with overrides).
    pub fn config(&self) -> &Value {
        self.config
    }

    /// Deserializes the effective config.
    pub fn config_as<T: DeserializeOwned>(&self) -> ParleyResult<T> {
        Ok(T::deserialize(self.config)?)
    }

    /// Contributes a closure at `stage`.
    pub fn hook<F>(&mut self, stage: &str, f: F) -> ParleyResult<()>
    where
        F: for<'c> Fn(&'c mut Conversation) -> BoxFuture<'c, ParleyResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.hook_handler(stage, Arc::new(f))
    }

    /// Contributes an existing handler at `stage`.
    pub fn hook_handler(&mut self, stage: &str, handler: PipelineHandler) -> ParleyResult<()> {
        if !self.middleware.has(stage) {
            return Err(ParleyError::InvalidStage(stage.to_string()));
        }
        self.contributions.push((stage.to_string(), handler));
        Ok(())
    }

    /// Registers a nested plugin, installed right after this one.
    pub fn register(&mut self, plugin: PluginHandle) {
        self.children.push(plugin);
    }
}

// ─── PluginContext ────────────────────────────────────────────────────────────

/// Passed to [`Plugin::initialize`].
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    name: &'a str,
    config: &'a Value,
}

impl<'a> PluginContext<'a> {
    pub fn new(name: &'a str, config: &'a Value) -> Self {
        Self { name, config }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn config(&self) -> &Value {
        self.config
    }

    /// Deserializes the plugin config.
    pub fn config_as<T: DeserializeOwned>(&self) -> ParleyResult<T> {
        Ok(T::deserialize(self.config)?)
    }
}
