//! # Parley Core Platform
//!
//! A platform adapter for Parley's own JSON format, for web and app clients
//! that talk to the app directly rather than through a voice assistant.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parley_platform_core::CorePlatform;
//! use parley_runtime::App;
//!
//! let app = App::builder()
//!     .register([Usable::plugin(CorePlatform::default())])
//!     .build()?;
//! ```
//!
//! The adapter accepts every payload whose `platform` field equals its
//! configured name (`"core"` by default), reads input, session and user at
//! `request.start` and renders the output at `response.output`. See
//! [`model`] for the exact format.

pub mod config;
pub mod model;
mod platform;

pub use config::CorePlatformConfig;
pub use model::{CoreRequest, CoreResponse, ResponseSession};
pub use platform::CorePlatform;
