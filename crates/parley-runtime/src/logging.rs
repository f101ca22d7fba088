//! Tracing subscriber setup for Parley apps.
//!
//! The subscriber is process-global, so initialization is best effort: if
//! something else (a test harness, the host binary) installed one first, the
//! call is a no-op.
//!
//! ```rust,ignore
//! use parley_runtime::config::load_config;
//! use parley_runtime::logging;
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.telemetry);
//! ```
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, SpanEventConfig, TelemetryConfig};

const DEFAULT_LOG_FILE: &str = "parley.log";

/// Span lifecycle events to emit.
///
/// Each request is processed inside a `parley.request` span, so `LIFECYCLE`
/// is usually enough to see how long requests take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close only.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.enter {
            span |= fmt::format::FmtSpan::ENTER;
        }
        if self.exit {
            span |= fmt::format::FmtSpan::EXIT;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_from_config(config: &TelemetryConfig) -> bool {
    LoggingBuilder::from_config(config).try_init().is_ok()
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builder for the tracing subscriber.
///
/// ```rust,ignore
/// LoggingBuilder::new()
///     .level(LogLevel::Debug)
///     .directive("parley_transport=trace")
///     .span_events(SpanEvents::LIFECYCLE)
///     .init();
/// ```
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: LogLevel,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            level: LogLevel::Info,
            directives: Vec::new(),
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            thread_ids: false,
            file_location: false,
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        let mut builder = Self::new()
            .level(config.level)
            .format(config.format)
            .output(config.output)
            .span_events(SpanEvents::from(&config.span_events))
            .thread_ids(config.thread_ids)
            .file_location(config.file_location);
        builder.file_path.clone_from(&config.file_path);

        // Sorted so the resulting filter does not depend on map order.
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));
        for (module, level) in filters {
            builder = builder.directive(format!("{module}={level}"));
        }
        builder
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Adds an `EnvFilter` directive such as `parley_core=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Include source file and line number.
    pub fn file_location(mut self, enabled: bool) -> Self {
        self.file_location = enabled;
        self
    }

    /// The filter directives in application order, base level first.
    pub fn filter_directives(&self) -> Vec<String> {
        std::iter::once(self.level.to_string())
            .chain(self.directives.iter().cloned())
            .collect()
    }

    fn build_filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }

        let mut filter = EnvFilter::new(self.level.as_str());
        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => warn!(directive = %directive, error = %e, "Ignoring invalid log filter"),
            }
        }
        filter
    }

    /// Installs the subscriber, ignoring an already installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let span_events = self.span_events.to_fmt_span();

        macro_rules! configure_layer {
            ($layer:expr) => {
                $layer
                    .with_span_events(span_events)
                    .with_target(true)
                    .with_thread_ids(self.thread_ids)
                    .with_file(self.file_location)
                    .with_line_number(self.file_location)
            };
        }

        macro_rules! init_with_writer {
            ($writer:expr) => {
                match self.format {
                    #[cfg(feature = "json-log")]
                    LogFormat::Json => tracing_subscriber::registry()
                        .with(
                            fmt::layer()
                                .json()
                                .with_span_events(span_events)
                                .with_writer($writer),
                        )
                        .with(filter)
                        .try_init(),
                    #[cfg(not(feature = "json-log"))]
                    LogFormat::Json => {
                        eprintln!("json log format needs the `json-log` feature, using compact");
                        tracing_subscriber::registry()
                            .with(configure_layer!(fmt::layer().compact().with_writer($writer)))
                            .with(filter)
                            .try_init()
                    }
                    LogFormat::Compact => tracing_subscriber::registry()
                        .with(configure_layer!(fmt::layer().compact().with_writer($writer)))
                        .with(filter)
                        .try_init(),
                    LogFormat::Full => tracing_subscriber::registry()
                        .with(configure_layer!(fmt::layer().with_writer($writer)))
                        .with(filter)
                        .try_init(),
                    LogFormat::Pretty => tracing_subscriber::registry()
                        .with(configure_layer!(fmt::layer().pretty().with_writer($writer)))
                        .with(filter)
                        .try_init(),
                }
            };
        }

        match self.output {
            LogOutput::Stdout => init_with_writer!(std::io::stdout),
            LogOutput::Stderr => init_with_writer!(std::io::stderr),
            LogOutput::File => {
                let path = self
                    .file_path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
                let appender = tracing_appender::rolling::never(
                    path.parent()
                        .filter(|p| !p.as_os_str().is_empty())
                        .unwrap_or_else(|| Path::new(".")),
                    path.file_name()
                        .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE)),
                );
                init_with_writer!(appender)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_from_config_orders_filters() {
        let config = TelemetryConfig {
            level: LogLevel::Warn,
            filters: HashMap::from([
                ("parley_transport".to_string(), LogLevel::Trace),
                ("parley_core".to_string(), LogLevel::Debug),
            ]),
            ..Default::default()
        };

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(
            builder.filter_directives(),
            vec!["warn", "parley_core=debug", "parley_transport=trace"]
        );
    }

    #[test]
    fn test_span_events_from_config() {
        let config = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(SpanEvents::from(&config), SpanEvents::LIFECYCLE);
        assert_eq!(SpanEvents::default(), SpanEvents::NONE);
    }
}
