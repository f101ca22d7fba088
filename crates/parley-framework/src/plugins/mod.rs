//! Built-in plugins registered by every app.

pub mod logging;
pub mod router;

pub use logging::BasicLoggingPlugin;
pub use router::{RouterPlugin, resolve_route};
