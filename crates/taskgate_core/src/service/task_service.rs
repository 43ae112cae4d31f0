//! Ownership-scoped task use cases.
//!
//! # Responsibility
//! - Stamp the caller as owner on create.
//! - Limit reads and writes to the caller's own tasks.
//!
//! # Invariants
//! - A task that exists but belongs to someone else is reported exactly like
//!   a task that does not exist (`NotFound`).
//! - Malformed ids are `InvalidIdentifier`, checked before any store access.
//! - `owner_id` never changes after creation.

use crate::error::{AuthError, AuthResult};
use crate::model::id::{PrincipalId, TaskId};
use crate::model::task::{Task, TaskDraft};
use crate::repo::task_repo::TaskRepository;
use log::{debug, info};

pub struct TaskService<R: TaskRepository> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a task owned by `owner`.
    pub fn create_owned(&self, owner: PrincipalId, draft: TaskDraft) -> AuthResult<Task> {
        draft.validate()?;
        let task = Task::from_draft(owner, draft);
        self.repo.create(&task)?;
        info!(
            "event=task_create module=task status=ok task_id={} owner_id={owner}",
            task.id
        );
        Ok(task)
    }

    pub fn get_owned(&self, owner: PrincipalId, id: &str) -> AuthResult<Task> {
        let id = TaskId::parse_hex(id.trim())?;
        self.load_owned(owner, id)
    }

    /// Replaces business fields of an owned task.
    pub fn update_owned(&self, owner: PrincipalId, id: &str, draft: TaskDraft) -> AuthResult<Task> {
        let id = TaskId::parse_hex(id.trim())?;
        draft.validate()?;
        let mut task = self.load_owned(owner, id)?;
        task.apply(draft);
        self.repo.update(&task)?;
        info!("event=task_update module=task status=ok task_id={id} owner_id={owner}");
        Ok(task)
    }

    pub fn delete_owned(&self, owner: PrincipalId, id: &str) -> AuthResult<()> {
        let id = TaskId::parse_hex(id.trim())?;
        self.load_owned(owner, id)?;
        self.repo.delete(id)?;
        info!("event=task_delete module=task status=ok task_id={id} owner_id={owner}");
        Ok(())
    }

    /// The caller's tasks, oldest first.
    pub fn list_owned(&self, owner: PrincipalId) -> AuthResult<Vec<Task>> {
        Ok(self.repo.list_by_owner(owner)?)
    }

    fn load_owned(&self, owner: PrincipalId, id: TaskId) -> AuthResult<Task> {
        match self.repo.get_by_id(id)? {
            Some(task) if task.is_owned_by(owner) => Ok(task),
            Some(_) => {
                debug!("event=task_access module=task status=denied task_id={id} owner_id={owner}");
                Err(AuthError::NotFound)
            }
            None => Err(AuthError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TaskService;
    use crate::error::AuthError;
    use crate::model::id::PrincipalId;
    use crate::model::task::TaskDraft;
    use crate::repo::memory::InMemoryTaskRepository;

    #[test]
    fn foreign_and_absent_tasks_look_the_same() {
        let tasks = TaskService::new(InMemoryTaskRepository::new());
        let alice = PrincipalId::generate();
        let bob = PrincipalId::generate();
        let task = tasks
            .create_owned(alice, TaskDraft::new("report", "todo"))
            .unwrap();
        let hex = task.id.to_hex();

        let foreign = tasks.get_owned(bob, &hex).unwrap_err();
        let absent = tasks
            .get_owned(bob, "0123456789abcdef0123456789abcdef")
            .unwrap_err();
        assert_eq!(foreign, AuthError::NotFound);
        assert_eq!(foreign, absent);

        assert_eq!(
            tasks
                .update_owned(bob, &hex, TaskDraft::new("x", "done"))
                .unwrap_err(),
            AuthError::NotFound
        );
        assert_eq!(tasks.delete_owned(bob, &hex).unwrap_err(), AuthError::NotFound);
        assert_eq!(tasks.get_owned(alice, &hex).unwrap().title, "report");
    }

    #[test]
    fn malformed_ids_are_rejected_before_lookup() {
        let tasks = TaskService::new(InMemoryTaskRepository::new());
        let owner = PrincipalId::generate();
        assert_eq!(
            tasks.get_owned(owner, "42").unwrap_err(),
            AuthError::InvalidIdentifier
        );
        assert_eq!(
            tasks.delete_owned(owner, "zz").unwrap_err(),
            AuthError::InvalidIdentifier
        );
    }

    #[test]
    fn listing_is_scoped_to_the_owner() {
        let tasks = TaskService::new(InMemoryTaskRepository::new());
        let alice = PrincipalId::generate();
        let bob = PrincipalId::generate();
        tasks.create_owned(alice, TaskDraft::new("a1", "todo")).unwrap();
        tasks.create_owned(bob, TaskDraft::new("b1", "todo")).unwrap();
        tasks.create_owned(alice, TaskDraft::new("a2", "todo")).unwrap();

        let titles: Vec<_> = tasks
            .list_owned(alice)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["a1", "a2"]);
    }

    #[test]
    fn invalid_drafts_are_rejected() {
        let tasks = TaskService::new(InMemoryTaskRepository::new());
        assert!(matches!(
            tasks.create_owned(PrincipalId::generate(), TaskDraft::new("", "todo")),
            Err(AuthError::InvalidInput(_))
        ));
    }
}
