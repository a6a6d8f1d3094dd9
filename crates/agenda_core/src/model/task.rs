//! Task domain model.
//!
//! # Responsibility
//! - Define the persisted task record and its write-side inputs.
//! - Validate task shape before any SQL runs.
//! - Parse user-entered reminder times.
//!
//! # Invariants
//! - `title` is non-empty after trimming.
//! - A recurring task always carries a reminder. Its time-of-day repeats daily
//!   and its date marks the first eligible day.

use crate::clock::parse_timestamp;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static TIME_OF_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{1,2})$").expect("valid time-of-day regex"));

/// Store-assigned row identity.
pub type TaskId = i64;

/// Priority tag used for ordering and display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Importance {
    #[default]
    Normal,
    Important,
    Urgent,
}

impl Importance {
    /// Stable label persisted in `tasks.importance`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Important => "Important",
            Self::Urgent => "Urgent",
        }
    }

    /// Parses a stored or user-provided label, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "important" => Some(Self::Important),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    /// Reads a nullable column value; unknown labels degrade to `Normal`.
    pub fn from_db(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }
}

impl Display for Importance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    /// Local creation time, second precision.
    pub created_at: NaiveDateTime,
    /// Raw stored reminder text.
    ///
    /// Normally `YYYY-MM-DD HH:MM:SS`, but rows from older files may hold
    /// other shapes; see [`Task::reminder_datetime`].
    pub reminder_at: Option<String>,
    pub completed: bool,
    /// Whether a due reminder should reach the notification sink.
    pub notify: bool,
    pub importance: Importance,
    /// Permanent daily reminder.
    pub recurring: bool,
}

impl Task {
    /// Parsed reminder, `None` when absent or not in storage format.
    pub fn reminder_datetime(&self) -> Option<NaiveDateTime> {
        self.reminder_at.as_deref().and_then(parse_timestamp)
    }

    pub fn is_pending(&self) -> bool {
        !self.completed
    }
}

/// Write-side input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    /// Stored with minute precision.
    pub reminder_at: Option<NaiveDateTime>,
    pub importance: Importance,
    pub recurring: bool,
    pub notify: bool,
}

impl NewTask {
    /// Creates a one-shot, normal-importance task with notifications on.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            reminder_at: None,
            importance: Importance::Normal,
            recurring: false,
            notify: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_reminder(mut self, reminder_at: NaiveDateTime) -> Self {
        self.reminder_at = Some(reminder_at);
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    /// Marks the task as a permanent daily reminder.
    pub fn recurring(mut self) -> Self {
        self.recurring = true;
        self
    }

    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    /// Validates create-time invariants.
    ///
    /// # Errors
    /// - `EmptyTitle` when the trimmed title is empty.
    /// - `RecurringWithoutReminder` when `recurring` is set without reminder.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_title(&self.title)?;
        validate_schedule(self.recurring, self.reminder_at.is_some())
    }
}

/// Partial update; `None` leaves the stored column untouched.
///
/// Nullable columns use a nested option: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub reminder_at: Option<Option<NaiveDateTime>>,
    pub notify: Option<bool>,
    pub importance: Option<Importance>,
    pub recurring: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.reminder_at.is_none()
            && self.notify.is_none()
            && self.importance.is_none()
            && self.recurring.is_none()
    }

    /// Validates fields that can be checked without the stored row.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        Ok(())
    }
}

/// Validation failures reported before any persistence happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    RecurringWithoutReminder,
    InvalidTimeOfDay(String),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "task title cannot be empty"),
            Self::RecurringWithoutReminder => {
                write!(f, "recurring tasks require a reminder time")
            }
            Self::InvalidTimeOfDay(input) => {
                write!(f, "invalid time of day `{input}`; expected HH:MM (e.g. 14:30)")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// Checks the recurring invariant for a resulting task shape.
pub fn validate_schedule(recurring: bool, has_reminder: bool) -> Result<(), TaskValidationError> {
    if recurring && !has_reminder {
        return Err(TaskValidationError::RecurringWithoutReminder);
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), TaskValidationError> {
    if title.trim().is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    Ok(())
}

/// Parses user-entered `HH:MM` (hour 0-23, minute 0-59).
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime, TaskValidationError> {
    let invalid = || TaskValidationError::InvalidTimeOfDay(input.to_string());
    let captures = TIME_OF_DAY_RE.captures(input.trim()).ok_or_else(invalid)?;
    let hour: u32 = captures[1].parse().map_err(|_| invalid())?;
    let minute: u32 = captures[2].parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Combines a picked date with user-entered `HH:MM` into a reminder.
pub fn compose_reminder(
    date: NaiveDate,
    time_of_day: &str,
) -> Result<NaiveDateTime, TaskValidationError> {
    Ok(date.and_time(parse_time_of_day(time_of_day)?))
}

/// Whether a reminder lies strictly before `now`.
///
/// Callers ask for confirmation on past one-shot reminders; recurring ones
/// are allowed to start in the past.
pub fn reminder_in_past(reminder: NaiveDateTime, now: NaiveDateTime) -> bool {
    reminder < now
}

/// Formats a reminder for display the way list views show it.
pub fn describe_reminder(task: &Task) -> Option<String> {
    let raw = task.reminder_at.as_deref()?;
    match (task.recurring, task.reminder_datetime()) {
        (true, Some(value)) => Some(format!("Daily {}", value.format("%H:%M"))),
        (false, Some(value)) => Some(value.format("%d/%m/%Y %H:%M").to_string()),
        (_, None) => Some(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{compose_reminder, parse_time_of_day, Importance, TaskValidationError};
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn parse_time_of_day_accepts_single_digit_parts() {
        let time = parse_time_of_day(" 9:05 ").unwrap();
        assert_eq!((time.hour(), time.minute()), (9, 5));
    }

    #[test]
    fn parse_time_of_day_rejects_out_of_range_and_extra_parts() {
        for input in ["24:00", "12:60", "12:30:00", "noon", "", "-1:30"] {
            assert_eq!(
                parse_time_of_day(input),
                Err(TaskValidationError::InvalidTimeOfDay(input.to_string())),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn compose_reminder_sets_zero_seconds() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let reminder = compose_reminder(date, "14:30").unwrap();
        assert_eq!(reminder.to_string(), "2024-01-01 14:30:00");
    }

    #[test]
    fn importance_parse_is_case_insensitive() {
        assert_eq!(Importance::parse(" URGENT "), Some(Importance::Urgent));
        assert_eq!(Importance::parse("important"), Some(Importance::Important));
        assert_eq!(Importance::parse("Urgente"), None);
        assert_eq!(Importance::from_db(Some("whatever")), Importance::Normal);
        assert_eq!(Importance::from_db(None), Importance::Normal);
    }
}
