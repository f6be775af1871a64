//! # Logging Module
//!
//! Time-rotated, compressed log files for the rollgate service.
//!
//! ## Features
//!
//! - **Scheduled Rollover**: fixed intervals, midnight or a weekday boundary, DST corrected
//! - **Compression**: rotated files are zipped, verified, then removed
//! - **Named Loggers**: a registry hands out one levelled logger per name
//! - **Tracing Bridge**: `tracing` events can be copied into a logger's file
//!
//! ## Layout
//!
//! - `policy`: when the next rollover happens and what the archive is called
//! - `sink`: the live file and the rollover sequence
//! - `archive`: the zip rollover hook
//! - `record` / `formatter`: what a log line holds and how it is rendered
//! - `registry`: name to logger mapping and log root resolution
//! - `layer`: the `tracing_subscriber` bridge

pub mod archive;
pub mod errors;
pub mod formatter;
pub mod layer;
pub mod policy;
pub mod record;
pub mod registry;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::LogError;
pub use record::{LogRecord, Severity, SourceLocation};
pub use registry::{Logger, LoggerRegistry, RegistryConfig, resolve_log_root};
