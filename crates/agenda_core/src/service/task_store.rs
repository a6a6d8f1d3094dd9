//! Task store use-case service.
//!
//! # Responsibility
//! - Provide the CRUD entry points used by front-ends and the reminder path.
//! - Stamp creation time from the injected clock.
//! - Open one connection per call and close it before returning.
//!
//! # Invariants
//! - No connection or cache is shared between calls or threads; the database
//!   file is the only shared state.
//! - Validation errors abort before a connection is opened.
//! - Store APIs never bypass repository validation/persistence contracts.

use crate::clock::Clock;
use crate::db::open_db;
use crate::model::task::{NewTask, Task, TaskId, TaskPatch};
use crate::repo::task_repo::{
    RepoError, RepoResult, SqliteTaskRepository, TaskListQuery, TaskRepository,
};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File-backed task store.
///
/// Cloning is cheap; clones address the same database file.
#[derive(Clone)]
pub struct TaskStore {
    db_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl TaskStore {
    /// Opens (and migrates) the database once, then keeps only its path.
    ///
    /// # Errors
    /// - Returns `RepoError::Db` when the file cannot be opened or migrated.
    pub fn open(db_path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> RepoResult<Self> {
        let db_path = db_path.into();
        drop(open_db(&db_path)?);
        info!(
            "event=store_open module=store status=ok db_path={}",
            db_path.display()
        );
        Ok(Self { db_path, clock })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Creates a pending task and returns its id.
    ///
    /// # Contract
    /// - `created_at` is the clock's current time.
    /// - `completed` starts as `false`.
    pub fn create(&self, task: &NewTask) -> RepoResult<TaskId> {
        task.validate()?;
        let created_at = self.clock.now();
        let id = self.with_repo(|repo| repo.create_task(task, created_at))?;
        info!(
            "event=task_create module=store status=ok task_id={} recurring={} has_reminder={}",
            id,
            task.recurring,
            task.reminder_at.is_some()
        );
        Ok(id)
    }

    /// Lists non-completed tasks in display order.
    pub fn read_pending(&self) -> RepoResult<Vec<Task>> {
        self.with_repo(|repo| repo.list_tasks(&TaskListQuery { completed: false }))
    }

    /// Lists completed tasks in display order.
    pub fn read_completed(&self) -> RepoResult<Vec<Task>> {
        self.with_repo(|repo| repo.list_tasks(&TaskListQuery { completed: true }))
    }

    /// Gets one task, `RepoError::NotFound` when missing.
    pub fn read_by_id(&self, id: TaskId) -> RepoResult<Task> {
        self.with_repo(|repo| repo.get_task(id))?
            .ok_or(RepoError::NotFound(id))
    }

    /// Applies the provided fields in one statement.
    ///
    /// An empty patch returns `Ok(())` without touching the database.
    pub fn update(&self, id: TaskId, patch: &TaskPatch) -> RepoResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        patch.validate()?;
        self.with_repo(|repo| repo.update_task(id, patch))?;
        info!("event=task_update module=store status=ok task_id={id}");
        Ok(())
    }

    pub fn delete(&self, id: TaskId) -> RepoResult<()> {
        self.with_repo(|repo| repo.delete_task(id))?;
        info!("event=task_delete module=store status=ok task_id={id}");
        Ok(())
    }

    pub fn mark_completed(&self, id: TaskId) -> RepoResult<()> {
        self.with_repo(|repo| repo.mark_completed(id))?;
        info!("event=task_complete module=store status=ok task_id={id}");
        Ok(())
    }

    /// Pending tasks that carry a reminder; input of the reminder matcher.
    pub fn reminder_candidates(&self) -> RepoResult<Vec<Task>> {
        self.with_repo(|repo| repo.list_reminder_candidates())
    }

    fn with_repo<T>(
        &self,
        f: impl FnOnce(&SqliteTaskRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let conn = open_db(&self.db_path)?;
        let repo = SqliteTaskRepository::new(&conn);
        f(&repo).inspect_err(|err| {
            if !matches!(err, RepoError::NotFound(_) | RepoError::Validation(_)) {
                warn!("event=store_call module=store status=error error={err}");
            }
        })
    }
}
