//! Core domain logic for the Agenda reminder manager.
//! This crate is the single source of truth for task and reminder rules;
//! front-ends (UI bridge, CLI) only call into it.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod reminder;
pub mod repo;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{save_theme_preferences, AppConfig, ConfigError, ThemePreferences, ThemeUpdate};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::task::{
    compose_reminder, parse_time_of_day, reminder_in_past, Importance, NewTask, Task, TaskId,
    TaskPatch, TaskValidationError,
};
pub use reminder::matcher::{DueTask, DueTaskSource, ReminderMatcher};
pub use reminder::poll::{
    NotificationError, NotificationSink, PollHandle, PollLoop, PollState, TickReport,
};
pub use repo::task_repo::{
    RepoError, RepoResult, SqliteTaskRepository, TaskListQuery, TaskRepository,
};
pub use service::task_store::TaskStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
