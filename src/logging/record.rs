//! # Log Records
//!
//! Severity levels, source locations and the immutable record handed to the
//! formatter for every log call.

use chrono::{DateTime, Local};
use std::fmt;
use std::str::FromStr;

///////////////////////////////////////////////////////////////////////////////
//****                          Public Types                             ****//
///////////////////////////////////////////////////////////////////////////////

/// Ordered severity levels, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warning,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}

/// Where a log call was made from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Last segment of the module path, e.g. `router` for `rollgate::routing::router`
    pub module: String,
    pub function: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(module_path: &str, function: &str, line: u32) -> Self {
        let module = module_path.rsplit("::").next().unwrap_or(module_path);
        Self {
            module: module.to_string(),
            function: function.to_string(),
            line,
        }
    }
}

/// A single log event. Built once per call and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub logger: String,
    pub severity: Severity,
    pub location: SourceLocation,
    pub message: String,
}

impl LogRecord {
    pub fn new(
        logger: &str,
        severity: Severity,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            logger: logger.to_string(),
            severity,
            location,
            message: message.into(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Build a [`SourceLocation`] for the calling line.
///
/// Pass the function name explicitly; inside a `#[named]` function that is
/// `here!(function_name!())`.
#[macro_export]
macro_rules! here {
    ($function:expr) => {
        $crate::logging::SourceLocation::new(module_path!(), $function, line!())
    };
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!("INFO".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!("warn".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!(" Critical ".parse::<Severity>(), Ok(Severity::Critical));
        assert!("verbose".parse::<Severity>().is_err());
    }

    #[test]
    fn test_source_location_keeps_last_module_segment() {
        let location = SourceLocation::new("rollgate::routing::router", "log_request", 42);
        assert_eq!(location.module, "router");
        assert_eq!(location.function, "log_request");
        assert_eq!(location.line, 42);

        let flat = SourceLocation::new("main", "main", 1);
        assert_eq!(flat.module, "main");
    }

    #[test]
    fn test_here_macro_uses_this_module() {
        let location = crate::here!("test_here_macro_uses_this_module");
        assert_eq!(location.module, "tests");
        assert_eq!(location.function, "test_here_macro_uses_this_module");
    }
}
