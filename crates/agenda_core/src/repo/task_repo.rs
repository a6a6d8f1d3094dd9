//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over the `tasks` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths validate input before SQL mutations.
//! - A partial update is one `UPDATE` statement inside one transaction.
//! - Reminder candidates skip undecodable rows; plain lists report them as
//!   `InvalidData`.
//! - Lists order by importance (Urgent, Important, Normal, other), then
//!   reminder ascending, then creation descending.

use crate::clock::{format_reminder, format_timestamp, parse_stored_timestamp};
use crate::db::DbError;
use crate::model::task::{
    validate_schedule, Importance, NewTask, Task, TaskId, TaskPatch, TaskValidationError,
};
use chrono::NaiveDateTime;
use log::warn;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TASK_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    created_at,
    reminder_at,
    completed,
    notify,
    importance,
    recurring
FROM tasks";

const TASK_ORDER_SQL: &str = "ORDER BY
    CASE importance
        WHEN 'Urgent' THEN 1
        WHEN 'Important' THEN 2
        WHEN 'Normal' THEN 3
        ELSE 4
    END,
    reminder_at ASC,
    created_at DESC,
    id DESC";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskListQuery {
    /// `false` lists pending tasks, `true` completed ones.
    pub completed: bool,
}

/// Repository interface for task CRUD operations.
pub trait TaskRepository {
    fn create_task(&self, task: &NewTask, created_at: NaiveDateTime) -> RepoResult<TaskId>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>>;
    /// Pending tasks with a non-null reminder, in list order.
    ///
    /// Rows that cannot be decoded are logged and skipped.
    fn list_reminder_candidates(&self) -> RepoResult<Vec<Task>>;
    fn update_task(&self, id: TaskId, patch: &TaskPatch) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    fn mark_completed(&self, id: TaskId) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, task: &NewTask, created_at: NaiveDateTime) -> RepoResult<TaskId> {
        task.validate()?;

        self.conn.execute(
            "INSERT INTO tasks (
                title,
                description,
                created_at,
                reminder_at,
                completed,
                notify,
                importance,
                recurring
            ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7);",
            params![
                task.title.as_str(),
                task.description.as_deref(),
                format_timestamp(created_at),
                task.reminder_at.map(format_reminder),
                bool_to_int(task.notify),
                task.importance.as_str(),
                bool_to_int(task.recurring),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }

        Ok(None)
    }

    fn list_tasks(&self, query: &TaskListQuery) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL} WHERE completed = ?1 {TASK_ORDER_SQL};"
        ))?;
        let tasks = collect_tasks(stmt.query([bool_to_int(query.completed)])?);
        tasks
    }

    fn list_reminder_candidates(&self) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE completed = 0
               AND reminder_at IS NOT NULL
             {TASK_ORDER_SQL};"
        ))?;
        let mut rows = stmt.query([])?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            match parse_task_row(row) {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    let id = row.get::<_, TaskId>("id").ok();
                    warn!(
                        "event=task_row_skipped module=repo status=error task_id={} error={err}",
                        id.map_or_else(|| "unknown".to_string(), |id| id.to_string())
                    );
                }
            }
        }
        Ok(tasks)
    }

    fn update_task(&self, id: TaskId, patch: &TaskPatch) -> RepoResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        patch.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let stored = stored_schedule(&tx, id)?.ok_or(RepoError::NotFound(id))?;

        let recurring = patch.recurring.unwrap_or(stored.recurring);
        let has_reminder = match patch.reminder_at {
            Some(reminder_at) => reminder_at.is_some(),
            None => stored.has_reminder,
        };
        validate_schedule(recurring, has_reminder)?;

        let (assignments, mut bind_values) = patch_assignments(patch);
        bind_values.push(Value::Integer(id));
        tx.execute(
            &format!("UPDATE tasks SET {} WHERE id = ?;", assignments.join(", ")),
            params_from_iter(bind_values),
        )?;
        tx.commit()?;

        Ok(())
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn mark_completed(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("UPDATE tasks SET completed = 1 WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

struct StoredSchedule {
    recurring: bool,
    has_reminder: bool,
}

fn stored_schedule(tx: &Transaction<'_>, id: TaskId) -> RepoResult<Option<StoredSchedule>> {
    let schedule = tx
        .query_row(
            "SELECT recurring, reminder_at IS NOT NULL FROM tasks WHERE id = ?1;",
            [id],
            |row| {
                Ok(StoredSchedule {
                    recurring: row.get::<_, Option<i64>>(0)?.unwrap_or(0) != 0,
                    has_reminder: row.get::<_, i64>(1)? != 0,
                })
            },
        )
        .optional()?;
    Ok(schedule)
}

fn patch_assignments(patch: &TaskPatch) -> (Vec<&'static str>, Vec<Value>) {
    let mut assignments = Vec::new();
    let mut values = Vec::new();

    if let Some(title) = &patch.title {
        assignments.push("title = ?");
        values.push(Value::Text(title.clone()));
    }
    if let Some(description) = &patch.description {
        assignments.push("description = ?");
        values.push(optional_text(description.clone()));
    }
    if let Some(reminder_at) = patch.reminder_at {
        assignments.push("reminder_at = ?");
        values.push(optional_text(reminder_at.map(format_reminder)));
    }
    if let Some(notify) = patch.notify {
        assignments.push("notify = ?");
        values.push(Value::Integer(bool_to_int(notify)));
    }
    if let Some(importance) = patch.importance {
        assignments.push("importance = ?");
        values.push(Value::Text(importance.as_str().to_string()));
    }
    if let Some(recurring) = patch.recurring {
        assignments.push("recurring = ?");
        values.push(Value::Integer(bool_to_int(recurring)));
    }

    (assignments, values)
}

fn collect_tasks(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<Task>> {
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id: TaskId = row.get("id")?;

    let created_text: String = row.get("created_at")?;
    let created_at = parse_stored_timestamp(&created_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid created_at value `{created_text}` for task {id}"
        ))
    })?;

    let importance = Importance::from_db(row.get::<_, Option<String>>("importance")?.as_deref());

    Ok(Task {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        created_at,
        reminder_at: row.get("reminder_at")?,
        completed: parse_flag(row, "completed", id)?,
        notify: parse_flag(row, "notify", id)?,
        importance,
        recurring: parse_flag(row, "recurring", id)?,
    })
}

fn parse_flag(row: &Row<'_>, column: &str, id: TaskId) -> RepoResult<bool> {
    match row.get::<_, Option<i64>>(column)? {
        None | Some(0) => Ok(false),
        Some(1) => Ok(true),
        Some(other) => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` for task {id}"
        ))),
    }
}

fn optional_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
