//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Column additions are skipped when the column already exists. Files
//!   written before `user_version` tracking may already carry some of them.
//! - The `tareas` import keeps row ids and leaves the source table in place.

use crate::db::{DbError, DbResult};
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
enum MigrationStep {
    /// Idempotent SQL batch (`IF NOT EXISTS` forms only).
    Sql(&'static str),
    /// Additive column, applied only when missing.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
    /// Copies rows of the older Spanish-named `tareas` table, when present.
    ImportTareas,
}

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    step: MigrationStep,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        step: MigrationStep::Sql(include_str!("0001_tasks.sql")),
    },
    Migration {
        version: 2,
        step: MigrationStep::AddColumn {
            table: "tasks",
            column: "notify",
            definition: "INTEGER NOT NULL DEFAULT 1",
        },
    },
    Migration {
        version: 3,
        step: MigrationStep::AddColumn {
            table: "tasks",
            column: "importance",
            definition: "TEXT DEFAULT 'Normal'",
        },
    },
    Migration {
        version: 4,
        step: MigrationStep::AddColumn {
            table: "tasks",
            column: "recurring",
            definition: "INTEGER NOT NULL DEFAULT 0",
        },
    },
    Migration {
        version: 5,
        step: MigrationStep::ImportTareas,
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        apply_step(&tx, migration.step)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

fn apply_step(tx: &Transaction<'_>, step: MigrationStep) -> DbResult<()> {
    match step {
        MigrationStep::Sql(sql) => tx.execute_batch(sql)?,
        MigrationStep::AddColumn {
            table,
            column,
            definition,
        } => {
            if !table_has_column(tx, table, column)? {
                tx.execute_batch(&format!(
                    "ALTER TABLE {table} ADD COLUMN {column} {definition};"
                ))?;
            }
        }
        MigrationStep::ImportTareas => import_tareas(tx)?,
    }
    Ok(())
}

/// Imports `tareas` rows into `tasks`, translating column names and the
/// `Importante`/`Urgente` labels. Ids already used in `tasks` are skipped.
fn import_tareas(tx: &Transaction<'_>) -> DbResult<()> {
    if !table_exists(tx, "tareas")? {
        return Ok(());
    }

    let importance = if table_has_column(tx, "tareas", "importancia")? {
        "CASE importancia
            WHEN 'Urgente' THEN 'Urgent'
            WHEN 'Importante' THEN 'Important'
            ELSE COALESCE(importancia, 'Normal')
        END"
    } else {
        "'Normal'"
    };
    let recurring = if table_has_column(tx, "tareas", "es_permanente")? {
        "COALESCE(es_permanente, 0)"
    } else {
        "0"
    };
    let notify = if table_has_column(tx, "tareas", "notificacion_sistema")? {
        "COALESCE(notificacion_sistema, 1)"
    } else {
        "1"
    };

    tx.execute_batch(&format!(
        "INSERT OR IGNORE INTO tasks (
            id,
            title,
            description,
            created_at,
            reminder_at,
            completed,
            notify,
            importance,
            recurring
        )
        SELECT
            id,
            titulo,
            descripcion,
            fecha_creacion,
            fecha_recordatorio,
            COALESCE(completada, 0),
            {notify},
            {importance},
            {recurring}
        FROM tareas
        ORDER BY id;"
    ))?;
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
