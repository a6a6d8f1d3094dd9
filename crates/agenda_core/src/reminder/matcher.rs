//! Reminder matching.
//!
//! # Responsibility
//! - Decide which pending tasks are due at a given local minute.
//!
//! # Invariants
//! - One-shot reminders are due once the stored text is `<=` now in storage
//!   format. They stay due on every later call until completed or deleted.
//! - Recurring reminders are due only when the stored `HH:MM` equals now's
//!   `HH:MM` and the stored date is not after today. A tick that misses the
//!   exact minute skips that day.
//! - Matching has no side effects; repeated calls in one minute return the
//!   same tasks.
//! - Unparseable stored values never raise; they are "not due" unless the
//!   recurring `HH:MM` prefix fallback matches.

use crate::clock::{format_timestamp, parse_timestamp, TIME_OF_DAY_FORMAT};
use crate::model::task::{Importance, Task, TaskId};
use crate::repo::task_repo::RepoResult;
use crate::service::task_store::TaskStore;
use chrono::NaiveDateTime;
use log::debug;

/// Task selected for notification at one evaluation instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTask {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    /// Raw stored reminder text.
    pub reminder_at: String,
    pub notify: bool,
    pub importance: Importance,
    pub recurring: bool,
}

impl DueTask {
    /// Notification body: description plus an importance line.
    pub fn notification_message(&self) -> String {
        match self.description.as_deref() {
            Some(description) if !description.is_empty() => {
                format!("{description}\nImportance: {}", self.importance)
            }
            _ => format!("Importance: {}", self.importance),
        }
    }
}

/// Source of due tasks for the poll loop.
pub trait DueTaskSource: Send + Sync {
    fn due_at(&self, now: NaiveDateTime) -> RepoResult<Vec<DueTask>>;
}

/// Store-backed matcher.
#[derive(Clone)]
pub struct ReminderMatcher {
    store: TaskStore,
}

impl ReminderMatcher {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }

    /// Due tasks at the store clock's current time.
    pub fn due_now(&self) -> RepoResult<Vec<DueTask>> {
        self.due_at(self.store.clock().now())
    }
}

impl DueTaskSource for ReminderMatcher {
    fn due_at(&self, now: NaiveDateTime) -> RepoResult<Vec<DueTask>> {
        let candidates = self.store.reminder_candidates()?;
        let candidate_count = candidates.len();
        let due = select_due(candidates, now);
        debug!(
            "event=reminder_match module=reminder status=ok candidates={} due={}",
            candidate_count,
            due.len()
        );
        Ok(due)
    }
}

/// Filters tasks down to the ones due at `now`, preserving input order.
pub fn select_due(tasks: impl IntoIterator<Item = Task>, now: NaiveDateTime) -> Vec<DueTask> {
    tasks
        .into_iter()
        .filter(|task| is_due(task, now))
        .filter_map(into_due_task)
        .collect()
}

/// Whether one task is due at `now`.
pub fn is_due(task: &Task, now: NaiveDateTime) -> bool {
    if task.completed {
        return false;
    }
    let Some(stored) = task.reminder_at.as_deref() else {
        return false;
    };

    if task.recurring {
        recurring_due(stored, now)
    } else {
        one_shot_due(stored, now)
    }
}

fn one_shot_due(stored: &str, now: NaiveDateTime) -> bool {
    stored <= format_timestamp(now).as_str()
}

fn recurring_due(stored: &str, now: NaiveDateTime) -> bool {
    let current_time = now.format(TIME_OF_DAY_FORMAT).to_string();
    match parse_timestamp(stored) {
        Some(reminder) => {
            reminder.date() <= now.date()
                && reminder.format(TIME_OF_DAY_FORMAT).to_string() == current_time
        }
        None => stored.starts_with(&current_time),
    }
}

fn into_due_task(task: Task) -> Option<DueTask> {
    Some(DueTask {
        id: task.id,
        title: task.title,
        description: task.description,
        reminder_at: task.reminder_at?,
        notify: task.notify,
        importance: task.importance,
        recurring: task.recurring,
    })
}

#[cfg(test)]
mod tests {
    use super::{is_due, DueTask};
    use crate::clock::parse_timestamp;
    use crate::model::task::{Importance, Task};

    fn task(reminder_at: Option<&str>, recurring: bool) -> Task {
        Task {
            id: 1,
            title: "stretch".to_string(),
            description: None,
            created_at: parse_timestamp("2024-01-01 08:00:00").unwrap(),
            reminder_at: reminder_at.map(str::to_string),
            completed: false,
            notify: true,
            importance: Importance::Normal,
            recurring,
        }
    }

    fn at(text: &str) -> chrono::NaiveDateTime {
        parse_timestamp(text).unwrap()
    }

    #[test]
    fn one_shot_is_due_at_and_after_reminder() {
        let task = task(Some("2024-06-15 09:00:00"), false);
        assert!(!is_due(&task, at("2024-06-15 08:59:59")));
        assert!(is_due(&task, at("2024-06-15 09:00:00")));
        assert!(is_due(&task, at("2024-06-20 17:30:00")));
    }

    #[test]
    fn recurring_requires_exact_minute_and_started_date() {
        let task = task(Some("2024-01-01 09:00:00"), true);
        assert!(is_due(&task, at("2024-06-15 09:00:00")));
        assert!(is_due(&task, at("2024-06-15 09:00:59")));
        assert!(!is_due(&task, at("2024-06-15 09:01:00")));
        assert!(!is_due(&task, at("2023-12-31 09:00:00")));
    }

    #[test]
    fn recurring_with_time_only_value_uses_prefix_fallback() {
        let task = task(Some("07:45"), true);
        assert!(is_due(&task, at("2024-06-15 07:45:00")));
        assert!(!is_due(&task, at("2024-06-15 07:46:00")));
    }

    #[test]
    fn garbage_reminder_is_never_due_for_recurring() {
        let task = task(Some("every morning"), true);
        assert!(!is_due(&task, at("2024-06-15 07:45:00")));
    }

    #[test]
    fn completed_or_unscheduled_tasks_are_not_due() {
        let mut done = task(Some("2024-01-01 09:00:00"), false);
        done.completed = true;
        assert!(!is_due(&done, at("2024-06-15 09:00:00")));
        assert!(!is_due(&task(None, false), at("2024-06-15 09:00:00")));
    }

    #[test]
    fn notification_message_appends_importance_line() {
        let mut due = DueTask {
            id: 3,
            title: "pay rent".to_string(),
            description: Some("transfer to landlord".to_string()),
            reminder_at: "2024-06-01 10:00:00".to_string(),
            notify: true,
            importance: Importance::Urgent,
            recurring: false,
        };
        assert_eq!(
            due.notification_message(),
            "transfer to landlord\nImportance: Urgent"
        );

        due.description = Some(String::new());
        assert_eq!(due.notification_message(), "Importance: Urgent");
        due.description = None;
        assert_eq!(due.notification_message(), "Importance: Urgent");
    }
}
