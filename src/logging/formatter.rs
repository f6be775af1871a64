//! Renders a [`LogRecord`] into the single-line layout written to every log file:
//!
//! ```text
//! 2025-01-06 09:15:02,117 rollgate | router.log_request@57 | INFO: Request received: GET /v1/services/
//! ```

use super::record::LogRecord;

/// Timestamp layout, millisecond precision with a comma separator
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Fixed-layout record formatter
#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter;

impl Formatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(&self, record: &LogRecord) -> String {
        format!(
            "{} {} | {}.{}@{} | {}: {}",
            record.timestamp.format(TIMESTAMP_FORMAT),
            record.logger,
            record.location.module,
            record.location.function,
            record.location.line,
            record.severity,
            record.message
        )
    }
}
