//! Local wall-clock source and timestamp text format.
//!
//! # Responsibility
//! - Provide "now" as a naive local timestamp in one fixed UTC offset.
//! - Own the `YYYY-MM-DD HH:MM:SS` text format used in storage.
//!
//! # Invariants
//! - All reminder evaluation uses the same offset; daylight-saving shifts are
//!   not followed after the clock is built.
//! - Stored text sorts lexicographically in chronological order.

use chrono::{FixedOffset, Local, NaiveDateTime, Timelike, Utc};
use std::sync::Mutex;
use std::time::Duration;

/// Storage/text format for creation and reminder timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Time-of-day format compared by recurring reminders.
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M";

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock pinned to one UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Uses the host's local offset as observed right now.
    pub fn host_local() -> Self {
        Self::new(*Local::now().offset())
    }

    /// Returns `None` when the offset is outside +/- 24h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// Manually driven clock for simulations and tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Builds a clock from `YYYY-MM-DD HH:MM:SS` text.
    pub fn at(text: &str) -> Option<Self> {
        parse_timestamp(text).map(Self::new)
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.lock();
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *guard += delta;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDateTime> {
        self.now
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock()
    }
}

/// Formats a timestamp in storage format.
pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Formats a reminder with minute precision (seconds forced to `00`).
pub fn format_reminder(value: NaiveDateTime) -> String {
    let truncated = value
        .with_second(0)
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(value);
    format_timestamp(truncated)
}

/// Parses storage-format text; `None` for anything else.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).ok()
}

/// Parses a stored creation timestamp.
///
/// Besides the storage format this accepts an ISO `T` separator, fractional
/// seconds and minute precision, which rows written by other tools carry.
pub fn parse_stored_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    parse_timestamp(text).or_else(|| {
        STORED_TIMESTAMP_FALLBACK_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    })
}

const STORED_TIMESTAMP_FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
