//! Process-wide `tracing` setup for the revoke tools.
//!
//! One subscriber is installed per process: an `EnvFilter` in front of a
//! single formatting layer chosen by [`LogFormat`]. Output goes to stderr so
//! whatever a command prints on stdout (status JSON, summaries) can be piped.
//!
//! Owner emails and OAuth tokens must never reach a log line verbatim; pass
//! such values through [`redact_if_sensitive`] at the call site.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Json)
//!         .with_level(LogLevel::Debug),
//! )?;
//! tracing::debug!(phase = "files", "Walking");
//! ```

use std::fmt;
use std::io;
use std::str::FromStr;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::error::{Error, Result};

/// Crates that follow the configured level when no custom filter is given.
const WORKSPACE_TARGETS: &[&str] = &[
    "drive_revoke",
    "core_runtime",
    "core_revoke",
    "provider_google_drive",
    "bridge_desktop",
    "bridge_traits",
];

/// Dependencies held at `warn` in the default filter.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "reqwest", "sqlx"];

/// Field names whose values are dropped entirely.
const SECRET_FIELD_MARKERS: &[&str] = &[
    "token",
    "password",
    "secret",
    "api_key",
    "authorization",
    "bearer",
];

const REDACTED: &str = "[REDACTED]";

type FilteredRegistry = Layered<EnvFilter, Registry>;
type OutputLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync + 'static>;

/// How events are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; debug builds default to this.
    Pretty,
    /// One JSON object per event with fields flattened.
    Json,
    /// One line per event.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Compact
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let format = match s.to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            other => return Err(Error::Config(format!("Unknown log format: {}", other))),
        };
        Ok(format)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let directive = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(directive)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the workspace crates by the default filter.
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; replaces the default filter when set.
    pub filter: Option<String>,
    /// Report span closes (pretty) or span context (json).
    pub enable_spans: bool,
    pub show_target: bool,
    pub show_threads: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            enable_spans: true,
            show_target: true,
            show_threads: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    pub fn with_spans(mut self, enabled: bool) -> Self {
        self.enable_spans = enabled;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn show_threads(mut self, show: bool) -> Self {
        self.show_threads = show;
        self
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] when the filter does not parse or a global subscriber
/// is already set.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(output_layer(&config))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = config
        .filter
        .clone()
        .unwrap_or_else(|| default_filter(config.level));

    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", directives, e)))
}

fn default_filter(level: LogLevel) -> String {
    let workspace = WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level));
    let quiet = QUIET_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, LogLevel::Warn));

    workspace.chain(quiet).collect::<Vec<_>>().join(",")
}

fn output_layer(config: &LoggingConfig) -> OutputLayer {
    let base = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(config.show_target)
        .with_thread_ids(config.show_threads)
        .with_thread_names(config.show_threads);

    match config.format {
        LogFormat::Pretty => {
            let span_events = if config.enable_spans {
                FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            };
            base.pretty().with_span_events(span_events).boxed()
        }
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(config.enable_spans)
            .boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

/// Returns `value` in a form safe to log under `field_name`.
///
/// Secret-looking fields collapse to `[REDACTED]`. Email addresses keep their
/// first character only. Everything else passes through.
///
/// ```ignore
/// info!(owner = %redact_if_sensitive("owner", "alice@example.com"), "Account reachable");
/// // owner=a***@[REDACTED]
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    if is_secret_field(field_name) {
        return REDACTED.to_string();
    }
    mask_email(value).unwrap_or_else(|| value.to_string())
}

fn is_secret_field(field_name: &str) -> bool {
    let name = field_name.to_ascii_lowercase();
    SECRET_FIELD_MARKERS.iter().any(|marker| name.contains(marker))
}

fn mask_email(value: &str) -> Option<String> {
    let (local, domain) = value.split_once('@')?;
    if !domain.contains('.') {
        return None;
    }
    let initial = local.chars().next().map(String::from).unwrap_or_default();
    Some(format!("{}***@{}", initial, REDACTED))
}
