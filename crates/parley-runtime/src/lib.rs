//! Parley Runtime - app orchestration for the Parley conversational runtime.
//!
//! This crate provides:
//! - The [`App`] orchestrator that drives every request through the RIDR
//!   pipeline, and its [`ErrorSink`]
//! - Layered configuration loading with figment ([`config`])
//! - Tracing subscriber setup ([`logging`])
//!
//! # Serving over HTTP
//!
//! With the `http-server` feature the app can serve itself:
//!
//! ```ignore
//! use std::sync::Arc;
//! use parley_runtime::{App, config::load_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let app = App::builder().config(config.clone()).build()?;
//!     Arc::new(app).serve(&config.server).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Embedding
//!
//! Any [`Transport`](parley_core::Transport) can be handed to
//! [`App::handle`], for example `parley_transport::MemoryTransport` in tests.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;

// Re-exports
pub use app::{App, AppBuilder, ErrorSink};
pub use config::{ConfigError, ConfigLoader, ConfigResult, ParleyConfig, ServerConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
