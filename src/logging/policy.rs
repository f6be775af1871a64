//! # Rotation Policy
//!
//! Decides *when* a sink rolls over. All times are epoch seconds.
//!
//! ## Schedules
//!
//! - **Fixed intervals** (`Seconds`, `Minutes`, `Hours`, `Days`): every
//!   `interval` seconds from the moment the sink was opened
//! - **Midnight**: at the next midnight of the configured calendar
//! - **Weekly(day)**: at the midnight that ends `day`
//!
//! ## Daylight Saving Time
//!
//! Midnight and weekly boundaries are wall-clock boundaries. When DST starts
//! or ends between "now" and the computed boundary, the boundary is moved by
//! one hour so it keeps landing on local midnight. The shift is a flat
//! 3600 seconds; zones with other DST offsets are not modelled. UTC policies
//! never shift.

use super::errors::LogError;
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc, Weekday};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub const SECONDS_PER_DAY: i64 = 86_400;
const DST_SHIFT: i64 = 3_600;

///////////////////////////////////////////////////////////////////////////////
//****                          Public Types                             ****//
///////////////////////////////////////////////////////////////////////////////

/// Rollover schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    Seconds,
    Minutes,
    Hours,
    Days,
    Midnight,
    Weekly(Weekday),
}

impl When {
    /// Length of one period before the interval multiplier is applied
    pub fn base_seconds(&self) -> i64 {
        match self {
            When::Seconds => 1,
            When::Minutes => 60,
            When::Hours => 3_600,
            When::Days | When::Midnight => SECONDS_PER_DAY,
            When::Weekly(_) => 7 * SECONDS_PER_DAY,
        }
    }

    /// strftime pattern embedded in archive names
    pub fn suffix_format(&self) -> &'static str {
        match self {
            When::Seconds => "%Y-%m-%d_%H-%M-%S",
            When::Minutes => "%Y-%m-%d_%H-%M",
            When::Hours => "%Y-%m-%d_%H",
            When::Days | When::Midnight | When::Weekly(_) => "%Y-%m-%d",
        }
    }

    /// Midnight and weekly schedules follow the wall clock
    pub fn is_wall_clock(&self) -> bool {
        matches!(self, When::Midnight | When::Weekly(_))
    }
}

impl FromStr for When {
    type Err = LogError;

    /// Accepts the short codes `S`, `M`, `H`, `D`, `MIDNIGHT` and `W0`..`W6` (Monday = `W0`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        match code.as_str() {
            "S" => Ok(When::Seconds),
            "M" => Ok(When::Minutes),
            "H" => Ok(When::Hours),
            "D" => Ok(When::Days),
            "MIDNIGHT" => Ok(When::Midnight),
            _ => {
                let day = code
                    .strip_prefix('W')
                    .and_then(|d| d.parse::<u8>().ok())
                    .and_then(|d| Weekday::try_from(d).ok());
                match day {
                    Some(day) if code.len() == 2 => Ok(When::Weekly(day)),
                    _ => Err(LogError::Configuration(format!(
                        "Invalid rollover interval specified: {}",
                        s
                    ))),
                }
            }
        }
    }
}

/// Broken-down wall-clock time at an instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    pub seconds_from_midnight: i64,
    pub weekday: Weekday,
}

/// Calendar queries the policy needs about an instant
pub trait Calendar: Send + Sync + fmt::Debug {
    fn wall_clock(&self, epoch: i64) -> WallClock;
    /// Whether daylight saving time is in effect at `epoch`
    fn is_dst(&self, epoch: i64) -> bool;
    fn format(&self, epoch: i64, pattern: &str) -> String;
}

/// The system's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCalendar;

/// Coordinated Universal Time, never in DST
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcCalendar;

/// When and how a sink rolls over
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    when: When,
    interval: i64,
    use_utc: bool,
    calendar: Arc<dyn Calendar>,
}

///////////////////////////////////////////////////////////////////////////////
//****                        Calendar Impls                             ****//
///////////////////////////////////////////////////////////////////////////////

fn utc_at(epoch: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(epoch, 0).unwrap_or_default()
}

/// Offset outside DST for `year`: the smaller of the January and July offsets,
/// which covers both hemispheres
fn standard_offset(year: i32) -> Option<i32> {
    let january = Local.with_ymd_and_hms(year, 1, 1, 0, 0, 0).earliest()?;
    let july = Local.with_ymd_and_hms(year, 7, 1, 0, 0, 0).earliest()?;
    Some(
        january
            .offset()
            .local_minus_utc()
            .min(july.offset().local_minus_utc()),
    )
}

impl Calendar for LocalCalendar {
    fn wall_clock(&self, epoch: i64) -> WallClock {
        let local = utc_at(epoch).with_timezone(&Local);
        WallClock {
            seconds_from_midnight: local.num_seconds_from_midnight() as i64,
            weekday: local.weekday(),
        }
    }

    fn is_dst(&self, epoch: i64) -> bool {
        let local = utc_at(epoch).with_timezone(&Local);
        match standard_offset(local.year()) {
            Some(standard) => local.offset().local_minus_utc() > standard,
            None => false,
        }
    }

    fn format(&self, epoch: i64, pattern: &str) -> String {
        utc_at(epoch)
            .with_timezone(&Local)
            .format(pattern)
            .to_string()
    }
}

impl Calendar for UtcCalendar {
    fn wall_clock(&self, epoch: i64) -> WallClock {
        let utc = utc_at(epoch);
        WallClock {
            seconds_from_midnight: utc.num_seconds_from_midnight() as i64,
            weekday: utc.weekday(),
        }
    }

    fn is_dst(&self, _epoch: i64) -> bool {
        false
    }

    fn format(&self, epoch: i64, pattern: &str) -> String {
        utc_at(epoch).format(pattern).to_string()
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                        Rotation Policy                            ****//
///////////////////////////////////////////////////////////////////////////////

impl RotationPolicy {
    /// Create a policy. `interval` multiplies the schedule's base period and must be positive.
    pub fn new(
        when: When,
        interval: i64,
        use_utc: bool,
        calendar: Arc<dyn Calendar>,
    ) -> Result<Self, LogError> {
        if interval <= 0 {
            return Err(LogError::Configuration(format!(
                "rotation interval must be positive, got {}",
                interval
            )));
        }
        let interval = when.base_seconds().checked_mul(interval).ok_or_else(|| {
            LogError::Configuration(format!("rotation interval {} is too large", interval))
        })?;

        Ok(Self {
            when,
            interval,
            use_utc,
            calendar,
        })
    }

    /// Policy backed by the system clock's local zone, or UTC
    pub fn with_system_calendar(when: When, interval: i64, use_utc: bool) -> Result<Self, LogError> {
        let calendar: Arc<dyn Calendar> = if use_utc {
            Arc::new(UtcCalendar)
        } else {
            Arc::new(LocalCalendar)
        };
        Self::new(when, interval, use_utc, calendar)
    }

    /// Seconds between two rollovers
    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn use_utc(&self) -> bool {
        self.use_utc
    }

    /// First rollover boundary after `current`
    pub fn initial_rollover(&self, current: i64) -> i64 {
        if !self.when.is_wall_clock() {
            return current + self.interval;
        }

        let wall = self.calendar.wall_clock(current);
        let mut boundary = current + (SECONDS_PER_DAY - wall.seconds_from_midnight);

        if let When::Weekly(day_of_week) = self.when {
            let today = wall.weekday.num_days_from_monday() as i64;
            let target = day_of_week.num_days_from_monday() as i64;
            if today != target {
                let days_to_wait = if today < target {
                    target - today
                } else {
                    6 - today + target + 1
                };
                boundary += days_to_wait * SECONDS_PER_DAY;
            }
        }

        let corrected = boundary + self.dst_correction(current, boundary);
        if corrected > current { corrected } else { boundary }
    }

    /// Next boundary after a rollover triggered at `now`.
    ///
    /// Steps forward from `rollover_at` one interval at a time so a sink that
    /// sat idle across several periods stays on its original schedule. A
    /// rollover forced ahead of schedule keeps the pending boundary.
    pub fn next_rollover(&self, rollover_at: i64, now: i64) -> i64 {
        if now < rollover_at {
            return rollover_at;
        }

        let mut next = rollover_at + self.interval;
        while next <= now {
            next += self.interval;
        }

        next += self.dst_correction(now, next);
        while next <= now {
            next += self.interval;
        }
        next
    }

    /// Start of the period that ends at `rollover_at`, as it should appear in
    /// the archive name when the rollover happens at `now`
    pub fn period_start(&self, rollover_at: i64, now: i64) -> i64 {
        let start = rollover_at - self.interval;
        if self.use_utc {
            return start;
        }
        match (self.calendar.is_dst(now), self.calendar.is_dst(start)) {
            (true, false) => start + DST_SHIFT,
            (false, true) => start - DST_SHIFT,
            _ => start,
        }
    }

    /// Render `epoch` with this schedule's archive suffix pattern
    pub fn format_timestamp(&self, epoch: i64) -> String {
        self.calendar.format(epoch, self.when.suffix_format())
    }

    fn dst_correction(&self, now: i64, boundary: i64) -> i64 {
        if self.use_utc || !self.when.is_wall_clock() {
            return 0;
        }
        match (self.calendar.is_dst(now), self.calendar.is_dst(boundary)) {
            // DST starts before the boundary
            (false, true) => -DST_SHIFT,
            // DST ends before the boundary
            (true, false) => DST_SHIFT,
            _ => 0,
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
