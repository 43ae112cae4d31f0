//! Resource store contract and SQLite implementation for tasks.
//!
//! # Responsibility
//! - Provide CRUD over the `tasks` table plus a by-owner listing.
//!
//! # Invariants
//! - `update` never writes `owner_id`; a schema trigger also rejects any
//!   statement that tries to change it.
//! - The store performs no ownership checks; those live in
//!   `service::task_service`.

use crate::db::SharedConnection;
use crate::model::id::{PrincipalId, TaskId};
use crate::model::task::Task;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    title,
    description,
    due_at,
    status
FROM tasks";

/// Resource store interface.
pub trait TaskRepository: Send + Sync {
    fn create(&self, task: &Task) -> RepoResult<TaskId>;
    fn get_by_id(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Tasks owned by `owner`, oldest first.
    fn list_by_owner(&self, owner: PrincipalId) -> RepoResult<Vec<Task>>;
    /// Replaces business fields of `task.id`. `NotFound` if absent.
    fn update(&self, task: &Task) -> RepoResult<()>;
    /// Removes `id`. `NotFound` if absent.
    fn delete(&self, id: TaskId) -> RepoResult<()>;
}

impl<R: TaskRepository + ?Sized> TaskRepository for Arc<R> {
    fn create(&self, task: &Task) -> RepoResult<TaskId> {
        (**self).create(task)
    }

    fn get_by_id(&self, id: TaskId) -> RepoResult<Option<Task>> {
        (**self).get_by_id(id)
    }

    fn list_by_owner(&self, owner: PrincipalId) -> RepoResult<Vec<Task>> {
        (**self).list_by_owner(owner)
    }

    fn update(&self, task: &Task) -> RepoResult<()> {
        (**self).update(task)
    }

    fn delete(&self, id: TaskId) -> RepoResult<()> {
        (**self).delete(id)
    }
}

/// SQLite-backed task store.
pub struct SqliteTaskRepository {
    conn: SharedConnection,
}

impl SqliteTaskRepository {
    /// Constructs a store from a migrated connection.
    pub fn try_new(conn: SharedConnection) -> RepoResult<Self> {
        ensure_connection_ready(&conn.lock(), &["principals", "tasks"])?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository {
    fn create(&self, task: &Task) -> RepoResult<TaskId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tasks (id, owner_id, title, description, due_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                task.id.to_hex(),
                task.owner_id.to_hex(),
                task.title.as_str(),
                task.description.as_str(),
                task.due_at_ms,
                task.status.as_str(),
            ],
        )?;
        Ok(task.id)
    }

    fn get_by_id(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{TASK_SELECT_SQL} WHERE id = ?1;"),
            [id.to_hex()],
            |row| Ok(parse_task_row(row)),
        )
        .optional()?
        .transpose()
    }

    fn list_by_owner(&self, owner: PrincipalId) -> RepoResult<Vec<Task>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{TASK_SELECT_SQL} WHERE owner_id = ?1 ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([owner.to_hex()])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn update(&self, task: &Task) -> RepoResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE tasks
             SET
                title = ?1,
                description = ?2,
                due_at = ?3,
                status = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?5;",
            params![
                task.title.as_str(),
                task.description.as_str(),
                task.due_at_ms,
                task.status.as_str(),
                task.id.to_hex(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(task.id.to_hex()));
        }
        Ok(())
    }

    fn delete(&self, id: TaskId) -> RepoResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1;", [id.to_hex()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_hex()));
        }
        Ok(())
    }
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = row.get("id")?;
    let id = TaskId::parse_hex(&id_text)
        .map_err(|_| RepoError::InvalidData(format!("invalid id `{id_text}` in tasks.id")))?;

    let owner_text: String = row.get("owner_id")?;
    let owner_id = PrincipalId::parse_hex(&owner_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid owner `{owner_text}` in tasks.owner_id"))
    })?;

    Ok(Task {
        id,
        owner_id,
        title: row.get("title")?,
        description: row.get("description")?,
        due_at_ms: row.get("due_at")?,
        status: row.get("status")?,
    })
}
