//! Logging facilities for graphql-subscriber.
//!
//! The subscription manager reports protocol-level events (connection
//! established, transport errors, subscription errors, unparseable frames)
//! to a [`Logger`] supplied at construction. The default sink is
//! [`TracingLogger`], which forwards everything to the `tracing` crate. To see
//! the output, install a tracing subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! Internal diagnostics (frames sent, ignored message kinds, signal emission)
//! are emitted directly through `tracing` under the targets in [`targets`].

use std::fmt;

use serde_json::Value;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Target used by [`TracingLogger`](super::TracingLogger).
    pub const SUBSCRIBER: &str = "graphql_subscriber";
    /// Connection handshake and outbound frames.
    pub const CONNECTION: &str = "graphql_subscriber::connection";
    /// Inbound frame routing.
    pub const ROUTER: &str = "graphql_subscriber::router";
    /// Subscription bookkeeping and retry flushes.
    pub const MANAGER: &str = "graphql_subscriber::manager";
    /// Signal emission.
    pub const SIGNAL: &str = "graphql_subscriber::signal";
    /// Transport implementations.
    pub const TRANSPORT: &str = "graphql_subscriber::transport";
}

/// Severity of a log record, numbered like syslog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogSeverity {
    /// The system is unusable.
    Emergency = 0,
    /// Action must be taken immediately.
    Alert = 1,
    /// Critical conditions.
    Critical = 2,
    /// Error conditions.
    Error = 3,
    /// Warning conditions.
    Warning = 4,
    /// Normal but significant condition.
    Notice = 5,
    /// Informational messages.
    Info = 6,
    /// Debug-level messages.
    Debug = 7,
    /// Very detailed tracing.
    Trace = 8,
}

impl LogSeverity {
    /// The numeric severity code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Lowercase name of the severity.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Alert => "alert",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogCategory {
    /// Connection and protocol lifecycle.
    #[default]
    System,
    /// Security-relevant events.
    Threat,
    /// Message traffic.
    Traffic,
    /// Configuration problems.
    Config,
}

impl LogCategory {
    /// Display name of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::Threat => "Threat",
            Self::Traffic => "Traffic",
            Self::Config => "Config",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured log sink.
///
/// Any `Fn(LogSeverity, LogCategory, &str, Option<&Value>)` closure that is
/// `Send + Sync` implements this trait.
pub trait Logger: Send + Sync {
    /// Record a message with optional auxiliary data.
    fn log(&self, severity: LogSeverity, category: LogCategory, message: &str, data: Option<&Value>);
}

impl<F> Logger for F
where
    F: Fn(LogSeverity, LogCategory, &str, Option<&Value>) + Send + Sync,
{
    fn log(&self, severity: LogSeverity, category: LogCategory, message: &str, data: Option<&Value>) {
        self(severity, category, message, data)
    }
}

/// Forwards log records to `tracing`.
///
/// Emergency through Error map to `ERROR`, Warning to `WARN`, Notice and
/// Info to `INFO`, Debug to `DEBUG` and Trace to `TRACE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, severity: LogSeverity, category: LogCategory, message: &str, data: Option<&Value>) {
        let severity_name = severity.as_str();
        let category_name = category.as_str();
        let data = data.map(Value::to_string).unwrap_or_default();
        match severity {
            LogSeverity::Emergency
            | LogSeverity::Alert
            | LogSeverity::Critical
            | LogSeverity::Error => tracing::error!(
                target: targets::SUBSCRIBER,
                severity = severity_name,
                category = category_name,
                data = %data,
                "{message}"
            ),
            LogSeverity::Warning => tracing::warn!(
                target: targets::SUBSCRIBER,
                severity = severity_name,
                category = category_name,
                data = %data,
                "{message}"
            ),
            LogSeverity::Notice | LogSeverity::Info => tracing::info!(
                target: targets::SUBSCRIBER,
                severity = severity_name,
                category = category_name,
                data = %data,
                "{message}"
            ),
            LogSeverity::Debug => tracing::debug!(
                target: targets::SUBSCRIBER,
                severity = severity_name,
                category = category_name,
                data = %data,
                "{message}"
            ),
            LogSeverity::Trace => tracing::trace!(
                target: targets::SUBSCRIBER,
                severity = severity_name,
                category = category_name,
                data = %data,
                "{message}"
            ),
        }
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _: LogSeverity, _: LogCategory, _: &str, _: Option<&Value>) {}
}
