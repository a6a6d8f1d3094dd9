//! FFI use-case API for the desktop UI.
//!
//! # Responsibility
//! - Expose task store and reminder matcher use-cases as sync functions.
//! - Translate core errors into response envelopes the UI can display.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Timestamps cross the boundary as `YYYY-MM-DD HH:MM:SS` text, local time.
//! - Every call opens its own store connection.
//! - "Now" uses the `utc_offset_minutes` of `agenda.json` next to the
//!   database, falling back to the host offset.

use agenda_core::clock::format_timestamp;
use agenda_core::config::{WindowSize, DEFAULT_DB_FILE_NAME};
use agenda_core::model::task::describe_reminder;
use agenda_core::{
    compose_reminder, core_version as core_version_inner, init_logging as init_logging_inner,
    reminder_in_past, save_theme_preferences, AppConfig, Clock, DueTask, Importance, NewTask,
    ReminderMatcher, RepoError, Task, TaskPatch, TaskStore, ThemeUpdate,
};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

static ENTRY_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Returns an empty string on success and the error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return "log_dir cannot be empty".to_string();
    }
    match init_logging_inner(level.as_str(), Path::new(trimmed)) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Task row shaped for list and edit views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub created_at: String,
    /// Raw stored reminder text, when set.
    pub reminder_at: Option<String>,
    /// `Daily HH:MM`, `DD/MM/YYYY HH:MM`, or the raw text for legacy rows.
    pub reminder_label: Option<String>,
    pub completed: bool,
    pub notify: bool,
    /// `Normal|Important|Urgent`.
    pub importance: String,
    pub recurring: bool,
}

/// Due reminder ready for a notification popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderItem {
    pub task_id: i64,
    pub title: String,
    pub message: String,
    pub notify: bool,
}

/// Task input from the add/edit forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub description: String,
    /// Picked calendar date (`YYYY-MM-DD`); `None` means no reminder.
    pub reminder_date: Option<String>,
    /// `HH:MM` entered next to the date.
    pub reminder_time: Option<String>,
    pub importance: String,
    pub recurring: bool,
    pub notify: bool,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskActionResponse {
    pub ok: bool,
    pub task_id: Option<i64>,
    /// Human-readable result for a dialog.
    pub message: String,
    /// Set when a one-shot reminder lies in the past; the UI may confirm.
    pub reminder_in_past: bool,
}

impl TaskActionResponse {
    fn success(message: impl Into<String>, task_id: i64) -> Self {
        Self {
            ok: true,
            task_id: Some(task_id),
            message: message.into(),
            reminder_in_past: false,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            task_id: None,
            message: message.into(),
            reminder_in_past: false,
        }
    }
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListResponse {
    pub ok: bool,
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Creates a task from the add form.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Validation failures return `ok=false` with a readable message.
/// - A past one-shot reminder is stored and flagged with `reminder_in_past`.
#[flutter_rust_bridge::frb(sync)]
pub fn task_create(input: TaskInput) -> TaskActionResponse {
    let new_task = match new_task_from_input(&input) {
        Ok(task) => task,
        Err(message) => return TaskActionResponse::failure(message),
    };

    match with_task_store(|store| {
        let in_past = !new_task.recurring
            && new_task
                .reminder_at
                .is_some_and(|reminder| reminder_in_past(reminder, store.clock().now()));
        store.create(&new_task).map(|id| (id, in_past))
    }) {
        Ok((id, in_past)) => TaskActionResponse {
            reminder_in_past: in_past,
            ..TaskActionResponse::success("Task created.", id)
        },
        Err(err) => TaskActionResponse::failure(format!("task_create failed: {err}")),
    }
}

/// Replaces the editable fields of a task with the edit form values.
#[flutter_rust_bridge::frb(sync)]
pub fn task_update(task_id: i64, input: TaskInput) -> TaskActionResponse {
    let new_task = match new_task_from_input(&input) {
        Ok(task) => task,
        Err(message) => return TaskActionResponse::failure(message),
    };
    let patch = TaskPatch {
        title: Some(new_task.title),
        description: Some(new_task.description),
        reminder_at: Some(new_task.reminder_at),
        notify: Some(new_task.notify),
        importance: Some(new_task.importance),
        recurring: Some(new_task.recurring),
    };

    match with_task_store(|store| store.update(task_id, &patch)) {
        Ok(()) => TaskActionResponse::success("Task updated.", task_id),
        Err(err) => TaskActionResponse::failure(format!("task_update failed: {err}")),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn task_complete(task_id: i64) -> TaskActionResponse {
    match with_task_store(|store| store.mark_completed(task_id)) {
        Ok(()) => TaskActionResponse::success("Task completed.", task_id),
        Err(err) => TaskActionResponse::failure(format!("task_complete failed: {err}")),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn task_delete(task_id: i64) -> TaskActionResponse {
    match with_task_store(|store| store.delete(task_id)) {
        Ok(()) => TaskActionResponse::success("Task deleted.", task_id),
        Err(err) => TaskActionResponse::failure(format!("task_delete failed: {err}")),
    }
}

/// Lists pending or completed tasks in display order.
#[flutter_rust_bridge::frb(sync)]
pub fn task_list(completed: bool) -> TaskListResponse {
    let result = with_task_store(|store| {
        if completed {
            store.read_completed()
        } else {
            store.read_pending()
        }
    });
    match result {
        Ok(tasks) => TaskListResponse {
            ok: true,
            message: format!("{} task(s).", tasks.len()),
            items: tasks.into_iter().map(to_task_item).collect(),
        },
        Err(err) => TaskListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("task_list failed: {err}"),
        },
    }
}

/// Gets one task for the edit dialog; `None` when missing or on error.
#[flutter_rust_bridge::frb(sync)]
pub fn task_get(task_id: i64) -> Option<TaskItem> {
    match with_task_store(|store| store.read_by_id(task_id)) {
        Ok(task) => Some(to_task_item(task)),
        Err(RepoError::NotFound(_)) => None,
        Err(err) => {
            log::warn!("event=ffi_call module=ffi call=task_get status=error error={err}");
            None
        }
    }
}

/// Due reminders at the local current time.
///
/// The UI's own timer may call this instead of running the core poll loop;
/// errors yield an empty list.
#[flutter_rust_bridge::frb(sync)]
pub fn reminders_due() -> Vec<ReminderItem> {
    match with_task_store(|store| ReminderMatcher::new(store.clone()).due_now()) {
        Ok(due) => due.into_iter().map(to_reminder_item).collect(),
        Err(err) => {
            log::warn!("event=ffi_call module=ffi call=reminders_due status=error error={err}");
            Vec::new()
        }
    }
}

/// Theme preferences for window start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSettings {
    pub name: String,
    pub remember_style: bool,
    /// `full|medium|small`.
    pub window_size: String,
    /// Window size in pixels; both `None` means maximized.
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    /// Theme to apply at start-up (the default unless `remember_style`).
    pub startup_theme: String,
}

/// Loads theme preferences from `agenda.json` next to the database.
///
/// Missing or malformed files yield defaults.
#[flutter_rust_bridge::frb(sync)]
pub fn theme_settings_load() -> ThemeSettings {
    let theme = AppConfig::load(&entry_config_dir()).theme;
    let geometry = theme.window_size.geometry();
    ThemeSettings {
        window_width: geometry.map(|(width, _)| width),
        window_height: geometry.map(|(_, height)| height),
        startup_theme: theme.startup_theme().to_string(),
        window_size: theme.window_size.as_str().to_string(),
        remember_style: theme.remember_style,
        name: theme.name,
    }
}

/// Saves the provided theme preference fields; others are kept.
///
/// Returns an empty string on success and the error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn theme_settings_save(
    name: Option<String>,
    remember_style: Option<bool>,
    window_size: Option<String>,
) -> String {
    let window_size = match window_size.as_deref().map(WindowSize::parse) {
        Some(None) => return "window_size must be one of full|medium|small".to_string(),
        Some(parsed) => parsed,
        None => None,
    };
    let update = ThemeUpdate {
        name,
        remember_style,
        window_size,
    };
    match save_theme_preferences(&entry_config_dir(), &update) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

fn new_task_from_input(input: &TaskInput) -> Result<NewTask, String> {
    let importance = Importance::parse(&input.importance)
        .ok_or_else(|| format!("unknown importance `{}`", input.importance))?;

    let reminder_at = match (&input.reminder_date, &input.reminder_time) {
        (Some(date), Some(time)) => {
            let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                .map_err(|_| format!("invalid reminder date `{date}`; expected YYYY-MM-DD"))?;
            Some(compose_reminder(date, time).map_err(|err| err.to_string())?)
        }
        (Some(_), None) => return Err("a reminder needs a time (HH:MM)".to_string()),
        (None, _) => None,
    };

    let description = input.description.trim();
    let mut task = NewTask::new(input.title.trim())
        .with_importance(importance)
        .with_notify(input.notify);
    if !description.is_empty() {
        task = task.with_description(description);
    }
    if let Some(reminder_at) = reminder_at {
        task = task.with_reminder(reminder_at);
    }
    if input.recurring {
        task = task.recurring();
    }
    task.validate().map_err(|err| err.to_string())?;
    Ok(task)
}

fn resolve_entry_db_path() -> PathBuf {
    ENTRY_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var("AGENDA_DB_PATH") {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
        })
        .clone()
}

fn entry_config_dir() -> PathBuf {
    let db_path = resolve_entry_db_path();
    db_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir)
}

fn with_task_store<T>(
    f: impl FnOnce(&TaskStore) -> agenda_core::RepoResult<T>,
) -> agenda_core::RepoResult<T> {
    let store = open_store(resolve_entry_db_path(), &entry_config_dir())?;
    f(&store)
}

/// Opens the store with the clock configured in `config_dir/agenda.json`,
/// so reminders evaluate in the same offset as other front-ends.
fn open_store(db_path: PathBuf, config_dir: &Path) -> agenda_core::RepoResult<TaskStore> {
    let clock: Arc<dyn Clock> = Arc::new(AppConfig::load(config_dir).clock());
    TaskStore::open(db_path, clock)
}

fn to_task_item(task: Task) -> TaskItem {
    let reminder_label = describe_reminder(&task);
    TaskItem {
        id: task.id,
        title: task.title,
        description: task.description.unwrap_or_default(),
        created_at: format_timestamp(task.created_at),
        reminder_at: task.reminder_at,
        reminder_label,
        completed: task.completed,
        notify: task.notify,
        importance: task.importance.as_str().to_string(),
        recurring: task.recurring,
    }
}

fn to_reminder_item(task: DueTask) -> ReminderItem {
    ReminderItem {
        task_id: task.id,
        message: task.notification_message(),
        title: task.title,
        notify: task.notify,
    }
}
