//! # Logger Registry
//!
//! Maps a logical logger name to one [`Logger`], built lazily on first use.
//! Every logger writes to `<log_root>/<name>.log` through a compressing sink
//! that rolls over weekly on Monday.
//!
//! The registry is an ordinary value. The service keeps one in its shared
//! state and hands out references; nothing here is global.

use super::errors::LogError;
use super::policy::When;
use super::record::{LogRecord, Severity, SourceLocation};
use super::sink::{RotatingSink, SinkBuilder};
use chrono::Weekday;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Log directory used when nothing else is configured
pub const DEFAULT_LOG_DIR: &str = "log";

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Sink settings shared by every logger a registry creates
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub log_root: PathBuf,
    pub when: When,
    pub use_utc: bool,
    pub compress: bool,
    pub delay: bool,
}

impl RegistryConfig {
    /// Weekly Monday rollover in local time, compressed, opened eagerly
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
            when: When::Weekly(Weekday::Mon),
            use_utc: false,
            compress: true,
            delay: false,
        }
    }
}

/// A named, levelled handle onto one sink
#[derive(Debug)]
pub struct Logger {
    name: String,
    level: Severity,
    sink: RotatingSink,
}

#[derive(Debug)]
pub struct LoggerRegistry {
    config: RegistryConfig,
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
}

///////////////////////////////////////////////////////////////////////////////
//****                             Logger                                ****//
///////////////////////////////////////////////////////////////////////////////

impl Logger {
    pub fn new(name: impl Into<String>, level: Severity, sink: RotatingSink) -> Self {
        Self {
            name: name.into(),
            level,
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn sink(&self) -> &RotatingSink {
        &self.sink
    }

    pub fn is_enabled_for(&self, severity: Severity) -> bool {
        severity >= self.level
    }

    /// Write `message` when `severity` clears this logger's threshold
    pub fn log(
        &self,
        severity: Severity,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Result<(), LogError> {
        if !self.is_enabled_for(severity) {
            return Ok(());
        }
        let record = LogRecord::new(&self.name, severity, location, message);
        self.sink.write_record(&record)
    }

    pub fn debug(&self, message: impl Into<String>, location: SourceLocation) -> Result<(), LogError> {
        self.log(Severity::Debug, message, location)
    }

    pub fn info(&self, message: impl Into<String>, location: SourceLocation) -> Result<(), LogError> {
        self.log(Severity::Info, message, location)
    }

    pub fn warning(&self, message: impl Into<String>, location: SourceLocation) -> Result<(), LogError> {
        self.log(Severity::Warning, message, location)
    }

    pub fn error(&self, message: impl Into<String>, location: SourceLocation) -> Result<(), LogError> {
        self.log(Severity::Error, message, location)
    }

    pub fn critical(&self, message: impl Into<String>, location: SourceLocation) -> Result<(), LogError> {
        self.log(Severity::Critical, message, location)
    }

    pub fn flush(&self) -> Result<(), LogError> {
        self.sink.flush()
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                            Registry                               ****//
///////////////////////////////////////////////////////////////////////////////

impl LoggerRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn log_root(&self) -> &Path {
        &self.config.log_root
    }

    /// Return the logger called `name`, creating it on first use.
    ///
    /// `level` only applies when the logger is created; an existing logger is
    /// returned as it is.
    pub fn get_logger(&self, name: &str, level: Severity) -> Result<Arc<Logger>, LogError> {
        let mut loggers = self.lock_loggers();
        if let Some(existing) = loggers.get(name) {
            return Ok(existing.clone());
        }

        let log_root = &self.config.log_root;
        fs::create_dir_all(log_root).map_err(|e| LogError::io(log_root, e))?;

        let path = self.log_path(name);
        let sink = SinkBuilder::new(&path)
            .when(self.config.when)
            .utc(self.config.use_utc)
            .delay(self.config.delay)
            .compress(self.config.compress)
            .build()?;

        let logger = Arc::new(Logger::new(name, level, sink));
        loggers.insert(name.to_string(), logger.clone());
        debug!(logger = name, path = %path.display(), "Registered logger");
        Ok(logger)
    }

    /// File the logger called `name` writes to
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.config
            .log_root
            .join(format!("{}.log", file_name_for(name)))
    }

    /// Already-registered logger, without creating one
    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        self.lock_loggers().get(name).cloned()
    }

    /// Registered logger names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_loggers().keys().cloned().collect();
        names.sort();
        names
    }

    /// Flush every logger. Failures are logged and the first one is returned
    /// after all loggers have been tried.
    pub fn flush_all(&self) -> Result<(), LogError> {
        let loggers: Vec<Arc<Logger>> = self.lock_loggers().values().cloned().collect();

        let mut first_error = None;
        for logger in loggers {
            if let Err(e) = logger.flush() {
                warn!(logger = logger.name(), "Failed to flush logger: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn lock_loggers(&self) -> MutexGuard<'_, HashMap<String, Arc<Logger>>> {
        self.loggers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Where log files go: the override when given, `<exe dir>/log` for a
/// packaged build, otherwise `./log`
pub fn resolve_log_root(override_root: Option<&Path>, packaged: bool) -> PathBuf {
    if let Some(root) = override_root {
        return root.to_path_buf();
    }

    if packaged {
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        match exe_dir {
            Some(dir) => return dir.join(DEFAULT_LOG_DIR),
            None => warn!("Could not locate the executable, logging under the working directory"),
        }
    }

    PathBuf::from(DEFAULT_LOG_DIR)
}

/// `rollgate::server` is stored as `rollgate.server.log`
fn file_name_for(name: &str) -> String {
    name.replace("::", ".")
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::here;
    use std::thread;
    use tempfile::TempDir;

    fn registry_in(dir: &TempDir) -> LoggerRegistry {
        LoggerRegistry::new(RegistryConfig::new(dir.path().join("log")))
    }

    #[test]
    fn test_logger_file_lives_under_root() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        let logger = registry.get_logger("app", Severity::Info).unwrap();
        logger.info("started", here!("test")).unwrap();

        let path = dir.path().join("log").join("app.log");
        assert_eq!(logger.sink().base_path(), path.as_path());
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains(" app | tests.test@"));
        assert!(content.ends_with("| INFO: started\n"));
    }

    #[test]
    fn test_path_separators_become_dots() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        registry.get_logger("rollgate::server", Severity::Info).unwrap();

        assert!(dir.path().join("log").join("rollgate.server.log").exists());
    }

    #[test]
    fn test_level_only_applies_on_creation() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        let first = registry.get_logger("svc", Severity::Warning).unwrap();
        let again = registry.get_logger("svc", Severity::Debug).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(again.level(), Severity::Warning);
    }

    #[test]
    fn test_records_below_threshold_are_dropped() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        let logger = registry.get_logger("quiet", Severity::Warning).unwrap();

        logger.debug("hidden", here!("test")).unwrap();
        logger.info("hidden", here!("test")).unwrap();
        logger.error("shown", here!("test")).unwrap();
        logger.critical("also shown", here!("test")).unwrap();

        let content = fs::read_to_string(logger.sink().base_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("ERROR: shown"));
        assert!(lines[1].ends_with("CRITICAL: also shown"));
    }

    #[test]
    fn test_concurrent_first_use_yields_one_logger() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(registry_in(&dir));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || registry.get_logger("x", Severity::Info).unwrap())
            })
            .collect();
        let loggers: Vec<Arc<Logger>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(loggers.iter().all(|l| Arc::ptr_eq(l, &loggers[0])));
        assert_eq!(registry.names(), vec!["x".to_string()]);
    }

    #[test]
    fn test_get_does_not_create() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        assert!(registry.get("missing").is_none());
        assert!(registry.names().is_empty());
        assert!(!dir.path().join("log").exists());
    }

    #[test]
    fn test_flush_all_covers_every_logger() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        for name in ["a", "b", "c"] {
            registry
                .get_logger(name, Severity::Info)
                .unwrap()
                .warning("pending", here!("test"))
                .unwrap();
        }

        assert!(registry.flush_all().is_ok());
        assert_eq!(registry.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_resolve_log_root() {
        let custom = Path::new("/var/log/rollgate");
        assert_eq!(resolve_log_root(Some(custom), true), custom.to_path_buf());
        assert_eq!(resolve_log_root(None, false), PathBuf::from("log"));

        let packaged = resolve_log_root(None, true);
        assert!(packaged.ends_with("log"));
        assert!(packaged.is_absolute());
    }
}
