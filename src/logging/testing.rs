//! Deterministic clock and calendar doubles shared by the logging tests.

use super::policy::{Calendar, UtcCalendar, WallClock};
use super::sink::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now)),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// UTC wall clock with DST in effect for `[dst_from, dst_until)`
#[derive(Debug, Clone, Copy)]
pub struct DstWindowCalendar {
    dst_from: i64,
    dst_until: i64,
}

impl DstWindowCalendar {
    pub fn new(dst_from: i64, dst_until: i64) -> Self {
        Self {
            dst_from,
            dst_until,
        }
    }

    /// A calendar that never observes DST
    pub fn without_dst() -> Self {
        Self::new(0, 0)
    }
}

impl Calendar for DstWindowCalendar {
    fn wall_clock(&self, epoch: i64) -> WallClock {
        UtcCalendar.wall_clock(epoch)
    }

    fn is_dst(&self, epoch: i64) -> bool {
        epoch >= self.dst_from && epoch < self.dst_until
    }

    fn format(&self, epoch: i64, pattern: &str) -> String {
        UtcCalendar.format(epoch, pattern)
    }
}
