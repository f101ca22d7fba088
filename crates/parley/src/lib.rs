//! # Parley
//!
//! A middleware-pipeline runtime for conversational apps that serve several
//! voice and chat platforms from one codebase.
//!
//! ## Architecture
//!
//! Every request runs through the same fixed sequence of stages (RIDR:
//! Request, Interpretation, Dialogue, Response):
//!
//! ```text
//! ┌───────────┐    ┌─────┐    ┌──────────┐    ┌──────────────────────────────┐
//! │ Transport │───▶│ App │───▶│ Platform │───▶│ request.* ▶ interpretation.* │
//! │ (HTTP...) │    │     │    │ adapter  │    │ ▶ dialogue.* ▶ response.*    │
//! └───────────┘    └─────┘    └──────────┘    └──────────────────────────────┘
//! ```
//!
//! - **Plugins** contribute handlers to stages; platform adapters are plugins
//!   that also recognize payloads and build the conversation
//! - **Components** hold the dialogue logic; the router picks one handler per
//!   request from the intent and the component state stack
//! - **Each request** works on its own snapshot of the app, so registrations
//!   made while handling one request never leak into another
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parley::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let app = App::builder()
//!         .config(config.clone())
//!         .register([Usable::plugin(CorePlatform::default())])
//!         .register([ComponentDeclaration::new("Hello").global_handler(LAUNCH, |c| {
//!             Box::pin(async move {
//!                 c.tell("Hello world!");
//!                 Ok(())
//!             })
//!         })])
//!         .build()?;
//!
//!     Arc::new(app).serve(&config.server).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `platform-core` (default): the generic JSON platform adapter
//! - `toml-config` (default) / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `http-server`: axum webhook server and `App::serve`

pub use parley_core as core;
pub use parley_framework as framework;
#[cfg(feature = "platform-core")]
pub use parley_platform_core as platform_core;
pub use parley_runtime as runtime;
pub use parley_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use parley::prelude::*;
/// ```
pub mod prelude {
    // App - main entry point
    pub use parley_runtime::config::{ParleyConfig, load_config};
    pub use parley_runtime::{App, AppBuilder, ErrorSink};

    // Registration
    pub use parley_framework::{
        ComponentDeclaration, InstallContext, Plugin, PluginContext, PluginHandle, Usable,
    };
    pub use parley_framework::component::{END, LAUNCH, UNHANDLED};

    // Handling requests
    pub use parley_core::{BoxFuture, ParleyError, ParleyResult, stage};
    pub use parley_framework::{Conversation, HandleRequest, Input, InputType, Platform};

    // Transports
    pub use parley_transport::MemoryTransport;

    #[cfg(feature = "platform-core")]
    pub use parley_platform_core::CorePlatform;
}
