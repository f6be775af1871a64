//! # Rotating Sink
//!
//! An append-only log file that rolls over on a time schedule.
//!
//! ## Rollover Sequence
//!
//! 1. Close the live stream
//! 2. Work out the start of the period being closed (DST aware)
//! 3. Pick `<stem>_<timestamp>.log` next to the live file, adding `_<n>` on collision
//! 4. Move the live file there through the [`Rotator`]
//! 5. Hand the moved file to the [`RolloverHook`], if any (see `ZipCompressor`)
//! 6. Schedule the next rollover and reopen the live file (unless delayed)
//!
//! Steps 3-5 are skipped when the live file does not exist, which happens
//! for a delayed sink that has not been written to since its last rollover.
//!
//! ## Thread Safety
//!
//! Writes and rollovers on one sink are serialized by a single mutex.

use super::archive::ZipCompressor;
use super::errors::LogError;
use super::formatter::Formatter;
use super::policy::{Calendar, RotationPolicy, When};
use super::record::LogRecord;
use chrono::Utc;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::UNIX_EPOCH;
use tracing::{debug, error, warn};

///////////////////////////////////////////////////////////////////////////////
//****                          Public Traits                            ****//
///////////////////////////////////////////////////////////////////////////////

/// Source of "now", in epoch seconds
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> i64;
}

/// Moves a filled log file to its rotated name
pub trait Rotator: Send + Sync + fmt::Debug {
    fn rotate(&self, source: &Path, destination: &Path) -> io::Result<()>;
}

/// Runs after a log file has been rotated.
///
/// Returns the path that now holds the rotated content. An error means the
/// rotated file is still on disk, untouched.
pub trait RolloverHook: Send + Sync + fmt::Debug {
    fn on_rollover_complete(&self, rotated: &Path) -> Result<PathBuf, LogError>;
}

///////////////////////////////////////////////////////////////////////////////
//****                         Public Structs                            ****//
///////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Plain `fs::rename`
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameRotator;

impl Rotator for RenameRotator {
    fn rotate(&self, source: &Path, destination: &Path) -> io::Result<()> {
        fs::rename(source, destination)
    }
}

/// Mutable part of a sink, only touched with the sink's lock held
#[derive(Debug)]
struct RolloverState {
    rollover_at: i64,
    stream: Option<BufWriter<File>>,
}

/// A time-rotated log file
#[derive(Debug)]
pub struct RotatingSink {
    base_path: PathBuf,
    delay: bool,
    policy: RotationPolicy,
    formatter: Formatter,
    clock: Arc<dyn Clock>,
    rotator: Arc<dyn Rotator>,
    hook: Option<Arc<dyn RolloverHook>>,
    state: Mutex<RolloverState>,
}

/// Configures and opens a [`RotatingSink`]
pub struct SinkBuilder {
    path: PathBuf,
    when: When,
    interval: i64,
    use_utc: bool,
    delay: bool,
    clock: Arc<dyn Clock>,
    calendar: Option<Arc<dyn Calendar>>,
    rotator: Arc<dyn Rotator>,
    hook: Option<Arc<dyn RolloverHook>>,
    formatter: Formatter,
}

///////////////////////////////////////////////////////////////////////////////
//****                            Builder                                ****//
///////////////////////////////////////////////////////////////////////////////

impl SinkBuilder {
    /// Hourly rotation in local time, no compression, stream opened eagerly
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            when: When::Hours,
            interval: 1,
            use_utc: false,
            delay: false,
            clock: Arc::new(SystemClock),
            calendar: None,
            rotator: Arc::new(RenameRotator),
            hook: None,
            formatter: Formatter::new(),
        }
    }

    pub fn when(mut self, when: When) -> Self {
        self.when = when;
        self
    }

    /// Multiplier applied to the schedule's base period
    pub fn interval(mut self, interval: i64) -> Self {
        self.interval = interval;
        self
    }

    pub fn utc(mut self, use_utc: bool) -> Self {
        self.use_utc = use_utc;
        self
    }

    /// Open the file on first write instead of at build time
    pub fn delay(mut self, delay: bool) -> Self {
        self.delay = delay;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the calendar derived from [`SinkBuilder::utc`]
    pub fn calendar(mut self, calendar: Arc<dyn Calendar>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn rotator(mut self, rotator: Arc<dyn Rotator>) -> Self {
        self.rotator = rotator;
        self
    }

    pub fn hook(mut self, hook: Arc<dyn RolloverHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Install (or remove) the zip archiver as the rollover hook
    pub fn compress(mut self, enabled: bool) -> Self {
        self.hook = if enabled {
            Some(Arc::new(ZipCompressor::new()))
        } else {
            None
        };
        self
    }

    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn build(self) -> Result<RotatingSink, LogError> {
        let policy = match self.calendar {
            Some(calendar) => RotationPolicy::new(self.when, self.interval, self.use_utc, calendar)?,
            None => RotationPolicy::with_system_calendar(self.when, self.interval, self.use_utc)?,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| LogError::io(parent, e))?;
            }
        }

        // An existing file picks up its schedule from its last write
        let seed = modified_epoch(&self.path).unwrap_or_else(|| self.clock.now());
        let rollover_at = policy.initial_rollover(seed);

        let stream = if self.delay {
            None
        } else {
            Some(open_stream(&self.path)?)
        };

        debug!(
            path = %self.path.display(),
            rollover_at = rollover_at,
            interval = policy.interval(),
            "Opened rotating log sink"
        );

        Ok(RotatingSink {
            base_path: self.path,
            delay: self.delay,
            policy,
            formatter: self.formatter,
            clock: self.clock,
            rotator: self.rotator,
            hook: self.hook,
            state: Mutex::new(RolloverState {
                rollover_at,
                stream,
            }),
        })
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Public Functions                            ****//
///////////////////////////////////////////////////////////////////////////////

impl RotatingSink {
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Epoch second of the next scheduled rollover
    pub fn rollover_at(&self) -> i64 {
        self.lock_state().rollover_at
    }

    /// Whether the live stream is currently open
    pub fn is_open(&self) -> bool {
        self.lock_state().stream.is_some()
    }

    pub fn should_rollover(&self, now: i64) -> bool {
        now >= self.lock_state().rollover_at
    }

    /// Format and append a record, rolling over first when due
    pub fn write_record(&self, record: &LogRecord) -> Result<(), LogError> {
        let line = self.formatter.format(record);
        self.write_text(&line)
    }

    /// Append one line, rolling over first when due.
    ///
    /// When the rollover fails the line is still appended to the live file
    /// and the rollover error is returned afterwards.
    pub fn write_text(&self, text: &str) -> Result<(), LogError> {
        let mut state = self.lock_state();
        let now = self.clock.now();

        let rolled = if now >= state.rollover_at {
            self.rollover_locked(&mut state, now).map(|_| ())
        } else {
            Ok(())
        };
        let written = self.append_locked(&mut state, text);

        match (rolled, written) {
            (Err(rollover_err), Err(write_err)) => {
                error!(
                    path = %self.base_path.display(),
                    "Log record lost after failed rollover: {}",
                    write_err
                );
                Err(rollover_err)
            }
            (Err(rollover_err), Ok(())) => Err(rollover_err),
            (Ok(()), written) => written,
        }
    }

    /// Roll over as if the schedule fired at `now`. Returns the archive path, if one was made.
    pub fn rollover(&self, now: i64) -> Result<Option<PathBuf>, LogError> {
        let mut state = self.lock_state();
        self.rollover_locked(&mut state, now)
    }

    /// Roll over immediately, regardless of the schedule
    pub fn force_rollover(&self) -> Result<Option<PathBuf>, LogError> {
        let now = self.clock.now();
        self.rollover(now)
    }

    pub fn flush(&self) -> Result<(), LogError> {
        let mut state = self.lock_state();
        match state.stream.as_mut() {
            Some(stream) => stream
                .flush()
                .map_err(|e| LogError::io(&self.base_path, e)),
            None => Ok(()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RolloverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append_locked(&self, state: &mut RolloverState, text: &str) -> Result<(), LogError> {
        let stream = match state.stream.take() {
            Some(stream) => stream,
            None => open_stream(&self.base_path)?,
        };
        let stream = state.stream.insert(stream);

        writeln!(stream, "{}", text)
            .and_then(|_| stream.flush())
            .map_err(|e| LogError::io(&self.base_path, e))
    }

    fn rollover_locked(
        &self,
        state: &mut RolloverState,
        now: i64,
    ) -> Result<Option<PathBuf>, LogError> {
        if let Some(mut stream) = state.stream.take() {
            stream
                .flush()
                .map_err(|e| LogError::io(&self.base_path, e))?;
        }

        let mut archived = None;
        let mut hook_failure = None;

        if self.base_path.exists() {
            let period_start = self.policy.period_start(state.rollover_at, now);
            let destination =
                self.rotated_path(&self.policy.format_timestamp(period_start));

            self.rotator
                .rotate(&self.base_path, &destination)
                .map_err(|source| LogError::RotationIo {
                    from: self.base_path.clone(),
                    to: destination.clone(),
                    source,
                })?;
            debug!(
                from = %self.base_path.display(),
                to = %destination.display(),
                "Rotated log file"
            );

            match &self.hook {
                Some(hook) => match hook.on_rollover_complete(&destination) {
                    Ok(path) => archived = Some(path),
                    Err(e) => {
                        warn!("Post-rollover processing failed, keeping rotated file: {}", e);
                        hook_failure = Some(e);
                    }
                },
                None => archived = Some(destination),
            }
        }

        state.rollover_at = self.policy.next_rollover(state.rollover_at, now);

        if !self.delay {
            state.stream = Some(open_stream(&self.base_path)?);
        }

        match hook_failure {
            Some(e) => Err(e),
            None => Ok(archived),
        }
    }

    /// `<dir>/<stem>_<timestamp>.log`, or `<stem>_<timestamp>_<n>.log` when
    /// that name or its archive is already taken
    fn rotated_path(&self, timestamp: &str) -> PathBuf {
        let stem = self
            .base_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let directory = self.base_path.parent().unwrap_or_else(|| Path::new(""));

        let mut candidate = directory.join(format!("{}_{}.log", stem, timestamp));
        let mut suffix = 1;
        while candidate.exists() || ZipCompressor::archive_path(&candidate).exists() {
            candidate = directory.join(format!("{}_{}_{}.log", stem, timestamp, suffix));
            suffix += 1;
        }
        candidate
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                       Private Functions                           ****//
///////////////////////////////////////////////////////////////////////////////

/// Open for append, creating the parent directory when it has gone missing
fn open_stream(path: &Path) -> Result<BufWriter<File>, LogError> {
    let mut options = OpenOptions::new();
    options.append(true).create(true);

    let file = match options.open(path) {
        Ok(file) => file,
        Err(first_err) => {
            let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
            match parent {
                Some(parent) => {
                    fs::create_dir_all(parent).map_err(|e| LogError::io(parent, e))?;
                    options.open(path).map_err(|e| LogError::io(path, e))?
                }
                None => return Err(LogError::io(path, first_err)),
            }
        }
    };

    Ok(BufWriter::new(file))
}

fn modified_epoch(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(since_epoch.as_secs() as i64)
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
