//! The app orchestrator.
//!
//! An [`App`] owns the configuration, the plugin registry and the component
//! tree. For every request it takes a snapshot of all three, builds a
//! [`HandleRequest`] around it and drives the RIDR pipeline:
//!
//! ```text
//! mount ─▶ resolve platform ─▶ create conversation ─▶ run RIDR stages
//!       ─▶ dismount ─▶ write response (if any)
//! ```
//!
//! ```rust,ignore
//! use parley_runtime::App;
//!
//! let app = App::builder()
//!     .config_file("parley.toml")
//!     .register([Usable::plugin(CorePlatform::default())])
//!     .register([ComponentDeclaration::new("Hello").on_launch(|c| {
//!         Box::pin(async move {
//!             c.tell("Hello!");
//!             Ok(())
//!         })
//!     })])
//!     .build()?;
//!
//! app.initialize().await?;
//! app.handle(Box::new(transport)).await?;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use parley_core::{
    BoxFuture, BoxedTransport, I18n, ParleyError, ParleyResult, RIDR_STAGES, RequestHandler,
    ResourceI18n, deep_merge,
};
use parley_framework::{
    AppConfig, AppSnapshot, BasicLoggingPlugin, ComponentTree, Conversation, HandleRequest,
    PipelineHandler, PluginHandle, PluginRegistry, RouterPlugin, Usable, register_usables,
};
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::{ConfigLoader, ParleyConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

// =============================================================================
// Error sink
// =============================================================================

/// Receives every error the app could not handle itself.
///
/// Closures of the shape `Fn(&ParleyError, Option<&Conversation>)` implement
/// this trait; see [`App::on_error`].
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn on_error(&self, error: &ParleyError, conversation: Option<&Conversation>);
}

#[async_trait]
impl<F> ErrorSink for F
where
    F: Fn(&ParleyError, Option<&Conversation>) + Send + Sync,
{
    async fn on_error(&self, error: &ParleyError, conversation: Option<&Conversation>) {
        self(error, conversation)
    }
}

// =============================================================================
// App
// =============================================================================

struct AppState {
    config: AppConfig,
    plugins: PluginRegistry,
    components: ComponentTree,
}

/// The application: registry, component tree, config and error sink.
///
/// All methods take `&self`; share the app between tasks with an `Arc`.
pub struct App {
    state: RwLock<AppState>,
    i18n: Arc<dyn I18n>,
    error_sink: RwLock<Option<Arc<dyn ErrorSink>>>,
    initialized: tokio::sync::Mutex<bool>,
}

impl App {
    /// Creates an app with the configuration-backed i18n backend.
    pub fn new(config: AppConfig) -> ParleyResult<Self> {
        Self::with_i18n(config, Arc::new(ResourceI18n::new()))
    }

    /// Creates an app with a custom i18n backend.
    ///
    /// The router plugin is always registered; the request logging plugin
    /// when `logging` is enabled.
    pub fn with_i18n(config: AppConfig, i18n: Arc<dyn I18n>) -> ParleyResult<Self> {
        let mut plugins = PluginRegistry::default();
        plugins.set_test_mode(config.test_mode);
        let mut components = ComponentTree::new();

        let mut builtins = vec![Usable::plugin(RouterPlugin)];
        if let Some(logging) = config.basic_logging() {
            builtins.push(Usable::plugin(BasicLoggingPlugin::new(logging)));
        }
        register_usables(&config, &mut plugins, &mut components, builtins)?;

        Ok(Self {
            state: RwLock::new(AppState {
                config,
                plugins,
                components,
            }),
            i18n,
            error_sink: RwLock::new(None),
            initialized: tokio::sync::Mutex::new(false),
        })
    }

    /// Creates a builder that loads configuration and sets up logging.
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Registers plugins and components.
    ///
    /// Components in one call form a single batch: either all of them are
    /// added or none is.
    pub fn register<I>(&self, usables: I) -> ParleyResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Usable>,
    {
        let mut guard = self.state.write();
        let AppState {
            config,
            plugins,
            components,
        } = &mut *guard;
        register_usables(config, plugins, components, usables)
    }

    /// Adds an app-wide handler at `stage`.
    pub fn hook<F>(&self, stage: &str, f: F) -> ParleyResult<PipelineHandler>
    where
        F: for<'a> Fn(&'a mut Conversation) -> BoxFuture<'a, ParleyResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.state.read().plugins.middleware().on(stage, f)
    }

    /// Deep-merges a partial configuration over the current one.
    ///
    /// Objects merge key by key, arrays and scalars are replaced. A `null`
    /// value is a scalar too: it clears free-form keys, and on a typed section
    /// such as `routing` it fails deserialization and leaves the config as it
    /// was. Enabling `logging` here registers the request logging plugin;
    /// disabling it has no effect on an already registered one.
    pub fn configure(&self, partial: Value) -> ParleyResult<()> {
        let mut guard = self.state.write();
        let AppState {
            config,
            plugins,
            components,
        } = &mut *guard;

        config.merge(partial)?;
        plugins.set_test_mode(config.test_mode);

        if let Some(logging) = config.basic_logging() {
            let handle = PluginHandle::new(BasicLoggingPlugin::new(logging.clone()))
                .with_config(serde_json::to_value(&logging)?);
            register_usables(config, plugins, components, [handle])?;
        }
        debug!(test_mode = config.test_mode, "App configuration updated");
        Ok(())
    }

    /// Returns a copy of the current configuration.
    pub fn config(&self) -> AppConfig {
        self.state.read().config.clone()
    }

    /// Names of the registered top-level plugins, in registration order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.state
            .read()
            .plugins
            .entries()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Paths of the registered components, parents first.
    pub fn component_paths(&self) -> Vec<String> {
        self.state
            .read()
            .components
            .iter()
            .map(|n| n.path().to_string())
            .collect()
    }

    /// Copies everything a request needs.
    pub fn snapshot(&self) -> AppSnapshot {
        let state = self.state.read();
        AppSnapshot {
            config: state.config.clone(),
            plugins: state.plugins.snapshot(),
            components: state.components.snapshot(),
            i18n: Arc::clone(&self.i18n),
        }
    }

    // ─── Errors ──────────────────────────────────────────────────────────────

    /// Installs `f` as the error sink, replacing any previous one.
    pub fn on_error<F>(&self, f: F)
    where
        F: Fn(&ParleyError, Option<&Conversation>) + Send + Sync + 'static,
    {
        self.set_error_sink(Arc::new(f));
    }

    pub fn set_error_sink(&self, sink: Arc<dyn ErrorSink>) {
        *self.error_sink.write() = Some(sink);
    }

    /// Reports `error` to the sink.
    ///
    /// Without a sink the error is handed back to the caller.
    pub async fn handle_error(
        &self,
        error: ParleyError,
        conversation: Option<&Conversation>,
    ) -> ParleyResult<()> {
        let sink = self.error_sink.read().clone();
        match sink {
            Some(sink) => {
                error!(error = %error, "Request failed");
                sink.on_error(&error, conversation).await;
                Ok(())
            }
            None => Err(error),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Sets up i18n and runs every plugin's `initialize` hook.
    ///
    /// Runs once; concurrent callers wait for the first call, later calls
    /// return immediately. A failed initialization is reported and may be
    /// retried.
    pub async fn initialize(&self) -> ParleyResult<()> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            debug!("App already initialized");
            return Ok(());
        }

        let (i18n_config, targets) = {
            let state = self.state.read();
            (state.config.i18n.clone(), state.plugins.lifecycle_targets())
        };

        let result = async {
            self.i18n.initialize(&i18n_config).await?;
            parley_framework::plugin::registry::initialize_all(&targets).await
        }
        .await;

        match result {
            Ok(()) => {
                *initialized = true;
                info!(plugins = targets.len(), "App initialized");
                Ok(())
            }
            Err(e) => self.handle_error(e, None).await,
        }
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.lock().await
    }

    /// Processes one request to completion.
    ///
    /// Errors are reported to the error sink (with the conversation when one
    /// exists) or returned when no sink is installed. The transport is only
    /// written to when the pipeline produced a response.
    pub async fn handle(&self, server: BoxedTransport) -> ParleyResult<()> {
        let span = info_span!("parley.request", transport = server.name());
        match self.process(server).instrument(span).await {
            Ok(()) => Ok(()),
            Err((error, conversation)) => self.handle_error(error, conversation.as_ref()).await,
        }
    }

    async fn process(
        &self,
        server: BoxedTransport,
    ) -> Result<(), (ParleyError, Option<Conversation>)> {
        let mut handle_request = HandleRequest::new(self.snapshot(), server);
        handle_request.mount().await.map_err(|e| (e, None))?;

        let platform = handle_request.resolve_platform().map_err(|e| (e, None))?;
        let Some(adapter) = platform.as_platform() else {
            return Err((ParleyError::NoMatchingPlatform, None));
        };
        let mut conversation = adapter.create_conversation(handle_request);
        debug!(platform = %conversation.platform(), "Conversation created");

        let middleware = conversation.handle_request().middleware().clone();
        if let Err(e) = middleware.run(&RIDR_STAGES, &mut conversation).await {
            return Err((e, Some(conversation)));
        }

        if let Err(e) = conversation.handle_request_mut().dismount().await {
            return Err((e, Some(conversation)));
        }

        match conversation.take_response() {
            Some(response) => {
                if let Err(e) = conversation
                    .handle_request_mut()
                    .server_mut()
                    .set_response(response)
                    .await
                {
                    return Err((e, Some(conversation)));
                }
                debug!("Response written");
            }
            None => debug!("Pipeline produced no response"),
        }
        Ok(())
    }

    // ─── Serving ─────────────────────────────────────────────────────────────

    /// Initializes the app and serves it over HTTP until Ctrl+C.
    #[cfg(feature = "http-server")]
    pub async fn serve(self: Arc<Self>, config: &crate::config::ServerConfig) -> RuntimeResult<()> {
        use parley_transport::http::HttpServer;

        self.initialize().await?;

        let handler: Arc<dyn RequestHandler> = self;
        let listener = HttpServer::new(config.to_transport_config())
            .serve(handler)
            .await?;
        info!(addr = %listener.local_addr(), "Parley app is now running. Press Ctrl+C to stop.");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C, shutting down");
        }
        listener.shutdown().await;
        info!("Parley app stopped");
        Ok(())
    }
}

#[async_trait]
impl RequestHandler for App {
    async fn handle(&self, server: BoxedTransport) -> ParleyResult<()> {
        App::handle(self, server).await
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("App")
            .field("plugins", &state.plugins.len())
            .field("components", &state.components.len())
            .field("test_mode", &state.config.test_mode)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// AppBuilder
// =============================================================================

/// Builds an [`App`] from layered configuration.
///
/// `build` loads the configuration, validates it, installs the tracing
/// subscriber described by its `telemetry` section and registers everything
/// passed to [`register`](Self::register).
#[derive(Default)]
pub struct AppBuilder {
    config: Option<ParleyConfig>,
    config_file: Option<PathBuf>,
    profile: Option<String>,
    overrides: Vec<Value>,
    i18n: Option<Arc<dyn I18n>>,
    usables: Vec<Usable>,
    error_sink: Option<Arc<dyn ErrorSink>>,
    init_logging: bool,
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            init_logging: true,
            ..Default::default()
        }
    }

    /// Uses a pre-loaded configuration instead of the loader.
    pub fn config(mut self, config: ParleyConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Loads this file instead of searching for one.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Merges a partial configuration over the loaded one.
    pub fn configure(mut self, partial: Value) -> Self {
        self.overrides.push(partial);
        self
    }

    pub fn i18n(mut self, i18n: Arc<dyn I18n>) -> Self {
        self.i18n = Some(i18n);
        self
    }

    pub fn register<I>(mut self, usables: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Usable>,
    {
        self.usables.extend(usables.into_iter().map(Into::into));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ParleyError, Option<&Conversation>) + Send + Sync + 'static,
    {
        self.error_sink = Some(Arc::new(f));
        self
    }

    /// Whether `build` installs the tracing subscriber. Defaults to `true`.
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    /// Loads configuration and assembles the app.
    pub fn build(self) -> RuntimeResult<App> {
        let config = match self.config {
            Some(config) if self.overrides.is_empty() => config,
            Some(config) => {
                let mut value = serde_json::to_value(&config).map_err(ParleyError::from)?;
                for partial in self.overrides {
                    deep_merge(&mut value, partial);
                }
                serde_json::from_value(value).map_err(ParleyError::from)?
            }
            None => {
                let mut loader = ConfigLoader::new().with_current_dir();
                if let Some(profile) = self.profile {
                    loader = loader.profile(profile);
                }
                if let Some(path) = self.config_file {
                    loader = loader.file(path);
                }
                for partial in self.overrides {
                    loader = loader.merge_value(partial);
                }
                loader.load()?
            }
        };
        validate_config(&config)?;

        if self.init_logging && !logging::init_from_config(&config.telemetry) {
            debug!("Tracing subscriber already installed");
        }
        info!(
            log_level = %config.telemetry.level,
            test_mode = config.app.test_mode,
            "Parley app configured"
        );

        let app = match self.i18n {
            Some(i18n) => App::with_i18n(config.app, i18n)?,
            None => App::new(config.app)?,
        };
        if !self.usables.is_empty() {
            app.register(self.usables)?;
        }
        if let Some(sink) = self.error_sink {
            app.set_error_sink(sink);
        }
        Ok(app)
    }
}
