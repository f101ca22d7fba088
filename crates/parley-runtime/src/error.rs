//! Runtime error types.

use parley_core::ParleyError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while building or serving an app.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The engine reported an error.
    #[error(transparent)]
    Parley(#[from] ParleyError),

    /// Binding or serving failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
