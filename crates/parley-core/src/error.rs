//! Unified error types for the Parley core.
//!
//! Every failure the orchestration engine can surface is a [`ParleyError`].
//! Runtime-level concerns (configuration loading) have their own error type in
//! `parley-runtime`.

use std::fmt;

use thiserror::Error;

/// Boxed error used as the source of handler and plugin hook failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Plugin lifecycle hook in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// One-time registration hook.
    Install,
    /// One-time async setup at app start.
    Initialize,
    /// Per-request setup.
    Mount,
    /// Per-request teardown.
    Dismount,
}

impl LifecyclePhase {
    /// Returns the phase name as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Initialize => "initialize",
            Self::Mount => "mount",
            Self::Dismount => "dismount",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ParleyError
// =============================================================================

/// Errors produced by the orchestration engine.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// No registered platform recognizes the inbound payload.
    #[error("no registered platform recognizes the inbound request")]
    NoMatchingPlatform,

    /// A stage name outside the collection's catalog was used.
    #[error("stage '{0}' is not part of the middleware catalog")]
    InvalidStage(String),

    /// Two components resolve to the same fully-qualified path.
    #[error("component '{path}' is already registered")]
    DuplicateComponent {
        /// The conflicting path.
        path: String,
    },

    /// A component declares a parent path that is not registered.
    #[error("component '{path}' declares parent '{parent}' which is not registered")]
    MissingParent {
        /// Path the component would have had.
        path: String,
        /// The unresolved parent path.
        parent: String,
    },

    /// A component lookup that must succeed did not.
    #[error("component '{0}' not found")]
    ComponentNotFound(String),

    /// The component exists but does not expose the handler.
    #[error("component '{path}' has no handler '{handler}'")]
    HandlerNotFound {
        /// Component path.
        path: String,
        /// Missing handler key.
        handler: String,
    },

    /// A plugin lifecycle hook failed.
    #[error("plugin '{plugin}' failed during {phase}: {source}")]
    PluginLifecycle {
        /// Plugin name.
        plugin: String,
        /// Hook that failed.
        phase: LifecyclePhase,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// A stage handler failed during a pipeline run.
    #[error("handler at stage '{stage}' failed: {source}")]
    Handler {
        /// Stage that was executing.
        stage: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// The transport could not deliver the response.
    #[error("transport error: {0}")]
    Transport(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl ParleyError {
    /// Wraps a failure raised by a handler at `stage`.
    ///
    /// Errors that already carry a stage are returned unchanged so nested runs
    /// keep the innermost stage.
    pub fn handler(stage: impl Into<String>, err: impl Into<BoxError>) -> Self {
        let err: BoxError = err.into();
        match err.downcast::<ParleyError>() {
            Ok(inner) if matches!(*inner, ParleyError::Handler { .. }) => *inner,
            Ok(inner) => Self::Handler {
                stage: stage.into(),
                source: inner,
            },
            Err(err) => Self::Handler {
                stage: stage.into(),
                source: err,
            },
        }
    }

    /// Wraps a failure raised by a plugin hook.
    pub fn lifecycle(
        plugin: impl Into<String>,
        phase: LifecyclePhase,
        err: impl Into<BoxError>,
    ) -> Self {
        Self::PluginLifecycle {
            plugin: plugin.into(),
            phase,
            source: err.into(),
        }
    }

    /// Creates an untyped error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Returns the innermost [`ParleyError`] when this one wraps another.
    pub fn root(&self) -> &ParleyError {
        match self {
            Self::Handler { source, .. } | Self::PluginLifecycle { source, .. } => source
                .downcast_ref::<ParleyError>()
                .map(ParleyError::root)
                .unwrap_or(self),
            _ => self,
        }
    }
}

/// Result type for core operations.
pub type ParleyResult<T> = Result<T, ParleyError>;
