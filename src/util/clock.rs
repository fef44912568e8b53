use core::fmt;

use chrono::{DateTime, Datelike, FixedOffset, Utc};

/// Source of wall-clock time for the stores and the tracker
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    /// Current time in whole seconds since the epoch
    fn timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Puzzles unlock at midnight US Eastern, which AoC pins to UTC-5 for the whole event.
const PUZZLE_UTC_OFFSET_SECS: i32 = -5 * 3600;
pub const LAST_PUZZLE_DAY: u32 = 25;

/// Returns the latest unlocked puzzle day for the given event year.
///
/// `0` before December 1st of `year`, the day of the month during December (capped at
/// [`LAST_PUZZLE_DAY`]), and [`LAST_PUZZLE_DAY`] once the event is over.
pub fn puzzle_day(year: i32, now: DateTime<Utc>) -> u32 {
    let Some(offset) = FixedOffset::east_opt(PUZZLE_UTC_OFFSET_SECS) else {
        return LAST_PUZZLE_DAY;
    };

    let local = now.with_timezone(&offset);
    if local.year() < year || (local.year() == year && local.month() < 12) {
        0
    } else if local.year() == year {
        local.day().min(LAST_PUZZLE_DAY)
    } else {
        LAST_PUZZLE_DAY
    }
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;

    /// Clock pinned to a settable epoch timestamp
    #[derive(Debug, Default)]
    pub struct ManualClock(AtomicI64);

    impl ManualClock {
        pub fn new(ts: i64) -> Self {
            Self(AtomicI64::new(ts))
        }

        pub fn set(&self, ts: i64) {
            self.0.store(ts, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.0.load(Ordering::SeqCst), 0).unwrap()
        }
    }
}
