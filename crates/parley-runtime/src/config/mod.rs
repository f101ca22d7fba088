//! Configuration module for the Parley runtime.
//!
//! Layered loading with figment (defaults, files, `PARLEY_*` environment
//! variables, programmatic overrides) plus validation of the result.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, ParleyConfig, ServerConfig, SpanEventConfig, TelemetryConfig,
};
pub use validation::validate_config;
