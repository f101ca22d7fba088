//! # Parley Transport
//!
//! Concrete [`Transport`](parley_core::Transport)s that deliver requests to a
//! [`RequestHandler`](parley_core::RequestHandler) (usually the app).
//!
//! ## Features
//!
//! - `http-server`: axum webhook server
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  parley-runtime     │  (App implements RequestHandler)
//! ├─────────────────────┤
//! │  parley-core        │  (Transport / RequestHandler traits)
//! ├─────────────────────┤
//! │  parley-transport   │  <- This crate
//! ├─────────────────────┤
//! │  Memory / HTTP      │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parley_transport::http::{HttpServer, HttpServerConfig};
//!
//! let handle = HttpServer::new(HttpServerConfig::new("0.0.0.0:3000", "/webhook"))
//!     .serve(app.clone())
//!     .await?;
//! // ...
//! handle.shutdown().await;
//! ```

pub mod http;
pub mod memory;

pub use memory::{MemoryTransport, ResponseProbe};

#[cfg(feature = "http-server")]
pub use http::{HttpServer, ListenerHandle};
