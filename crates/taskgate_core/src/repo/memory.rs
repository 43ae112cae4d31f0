//! In-memory stores with the same contracts as the SQLite ones.
//!
//! Used by tests and by `TaskGate::in_memory`. Each store guards its data with
//! one `RwLock`, which also makes `create_with_bootstrap_role` atomic.

use crate::model::id::{PrincipalId, TaskId};
use crate::model::principal::{Principal, Role};
use crate::model::task::Task;
use crate::repo::principal_repo::PrincipalRepository;
use crate::repo::task_repo::TaskRepository;
use crate::repo::{RepoError, RepoResult};
use parking_lot::RwLock;

#[derive(Default)]
pub struct InMemoryPrincipalRepository {
    principals: RwLock<Vec<Principal>>,
}

impl InMemoryPrincipalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_unique(principals: &mut Vec<Principal>, principal: Principal) -> RepoResult<()> {
    if principals.iter().any(|p| p.handle == principal.handle) {
        return Err(RepoError::DuplicateHandle(principal.handle));
    }
    principals.push(principal);
    Ok(())
}

impl PrincipalRepository for InMemoryPrincipalRepository {
    fn create(&self, principal: &Principal) -> RepoResult<PrincipalId> {
        insert_unique(&mut self.principals.write(), principal.clone())?;
        Ok(principal.id)
    }

    fn create_with_bootstrap_role(&self, principal: &Principal) -> RepoResult<Principal> {
        let mut principals = self.principals.write();
        let mut stored = principal.clone();
        stored.role = if principals.is_empty() {
            Role::Admin
        } else {
            Role::User
        };
        insert_unique(&mut principals, stored.clone())?;
        Ok(stored)
    }

    fn find_by_handle(&self, handle: &str) -> RepoResult<Option<Principal>> {
        Ok(self
            .principals
            .read()
            .iter()
            .find(|p| p.handle == handle)
            .cloned())
    }

    fn find_by_id(&self, id: PrincipalId) -> RepoResult<Option<Principal>> {
        Ok(self.principals.read().iter().find(|p| p.id == id).cloned())
    }

    fn update(&self, principal: &Principal) -> RepoResult<()> {
        let mut principals = self.principals.write();
        if principals
            .iter()
            .any(|p| p.id != principal.id && p.handle == principal.handle)
        {
            return Err(RepoError::DuplicateHandle(principal.handle.clone()));
        }
        let slot = principals
            .iter_mut()
            .find(|p| p.id == principal.id)
            .ok_or_else(|| RepoError::NotFound(principal.id.to_hex()))?;
        *slot = principal.clone();
        Ok(())
    }

    fn count(&self) -> RepoResult<u64> {
        Ok(self.principals.read().len() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<Vec<Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn create(&self, task: &Task) -> RepoResult<TaskId> {
        let mut tasks = self.tasks.write();
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(RepoError::InvalidData(format!(
                "duplicate task id {}",
                task.id
            )));
        }
        tasks.push(task.clone());
        Ok(task.id)
    }

    fn get_by_id(&self, id: TaskId) -> RepoResult<Option<Task>> {
        Ok(self.tasks.read().iter().find(|t| t.id == id).cloned())
    }

    fn list_by_owner(&self, owner: PrincipalId) -> RepoResult<Vec<Task>> {
        Ok(self
            .tasks
            .read()
            .iter()
            .filter(|t| t.owner_id == owner)
            .cloned()
            .collect())
    }

    fn update(&self, task: &Task) -> RepoResult<()> {
        let mut tasks = self.tasks.write();
        let slot = tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| RepoError::NotFound(task.id.to_hex()))?;
        let owner_id = slot.owner_id;
        *slot = Task {
            owner_id,
            ..task.clone()
        };
        Ok(())
    }

    fn delete(&self, id: TaskId) -> RepoResult<()> {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(RepoError::NotFound(id.to_hex()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryPrincipalRepository, InMemoryTaskRepository};
    use crate::model::id::PrincipalId;
    use crate::model::principal::{Principal, Role};
    use crate::model::task::{Task, TaskDraft};
    use crate::repo::principal_repo::PrincipalRepository;
    use crate::repo::task_repo::TaskRepository;
    use crate::repo::RepoError;

    #[test]
    fn bootstrap_role_goes_to_the_first_insert_only() {
        let repo = InMemoryPrincipalRepository::new();
        let first = repo
            .create_with_bootstrap_role(&Principal::new("alice", "h", Role::User))
            .unwrap();
        let second = repo
            .create_with_bootstrap_role(&Principal::new("bob", "h", Role::Admin))
            .unwrap();
        assert_eq!(first.role, Role::Admin);
        assert_eq!(second.role, Role::User);
    }

    #[test]
    fn duplicate_handles_are_rejected() {
        let repo = InMemoryPrincipalRepository::new();
        repo.create(&Principal::new("alice", "h", Role::User))
            .unwrap();
        let err = repo
            .create(&Principal::new("alice", "h2", Role::User))
            .unwrap_err();
        assert!(matches!(err, RepoError::DuplicateHandle(handle) if handle == "alice"));
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn task_update_preserves_stored_owner() {
        let repo = InMemoryTaskRepository::new();
        let owner = PrincipalId::generate();
        let task = Task::from_draft(owner, TaskDraft::new("t", "todo"));
        repo.create(&task).unwrap();

        let mut hijack = task.clone();
        hijack.owner_id = PrincipalId::generate();
        hijack.title = "changed".to_string();
        repo.update(&hijack).unwrap();

        let stored = repo.get_by_id(task.id).unwrap().unwrap();
        assert_eq!(stored.owner_id, owner);
        assert_eq!(stored.title, "changed");
    }
}
