//! Application facade with the route policy applied.
//!
//! # Responsibility
//! - Wire config, hasher, token service, gate and stores together.
//! - Expose one method per route, each taking the raw `Authorization`
//!   header value where the route requires authentication.
//!
//! # Route policy
//! - public: `register`, `login`
//! - any authenticated principal: task routes
//! - `admin` only: `promote`

use crate::auth::gate::{AuthGate, RequestContext};
use crate::auth::password::{Argon2Hasher, CredentialHasher};
use crate::auth::token::{IssuedToken, JwtTokenService, TokenService};
use crate::config::{AuthConfig, BootstrapPolicy, ConfigError};
use crate::db::{open_shared, open_shared_in_memory, DbError};
use crate::error::AuthResult;
use crate::model::principal::{PrincipalView, Role};
use crate::model::task::{TaskDraft, TaskView};
use crate::repo::memory::{InMemoryPrincipalRepository, InMemoryTaskRepository};
use crate::repo::principal_repo::{PrincipalRepository, SqlitePrincipalRepository};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::RepoError;
use crate::service::account_service::AccountService;
use crate::service::task_service::TaskService;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;

/// Startup failure while assembling a [`TaskGate`].
#[derive(Debug)]
pub enum SetupError {
    Config(ConfigError),
    Db(DbError),
    Repo(RepoError),
}

impl Display for SetupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Repo(err) => write!(f, "store error: {err}"),
        }
    }
}

impl Error for SetupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<ConfigError> for SetupError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for SetupError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for SetupError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Gate over the SQLite stores.
pub type SqliteTaskGate = TaskGate<SqlitePrincipalRepository, SqliteTaskRepository>;
pub type InMemoryTaskGate = TaskGate<InMemoryPrincipalRepository, InMemoryTaskRepository>;

pub struct TaskGate<P: PrincipalRepository, T: TaskRepository> {
    gate: AuthGate,
    accounts: AccountService<P>,
    tasks: TaskService<T>,
}

impl SqliteTaskGate {
    /// Opens (and migrates) the database file at `path`.
    pub fn open_sqlite(config: &AuthConfig, path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let conn = open_shared(path)?;
        let principals = SqlitePrincipalRepository::try_new(Arc::clone(&conn))?;
        let tasks = SqliteTaskRepository::try_new(conn)?;
        Self::new(config, principals, tasks)
    }

    /// SQLite-backed gate on a private in-memory database.
    pub fn open_sqlite_in_memory(config: &AuthConfig) -> Result<Self, SetupError> {
        let conn = open_shared_in_memory()?;
        let principals = SqlitePrincipalRepository::try_new(Arc::clone(&conn))?;
        let tasks = SqliteTaskRepository::try_new(conn)?;
        Self::new(config, principals, tasks)
    }
}

impl InMemoryTaskGate {
    pub fn in_memory(config: &AuthConfig) -> Result<Self, SetupError> {
        Self::new(
            config,
            InMemoryPrincipalRepository::new(),
            InMemoryTaskRepository::new(),
        )
    }
}

impl<P: PrincipalRepository, T: TaskRepository> TaskGate<P, T> {
    /// Builds the production hasher and token service from `config`.
    pub fn new(config: &AuthConfig, principals: P, tasks: T) -> Result<Self, SetupError> {
        let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new(config.hasher)?);
        let tokens: Arc<dyn TokenService> =
            Arc::new(JwtTokenService::new(&config.token_secret, config.token_ttl)?);
        Ok(Self::with_components(
            principals,
            tasks,
            hasher,
            tokens,
            config.bootstrap,
        ))
    }

    /// Assembles a gate from explicit components.
    pub fn with_components(
        principals: P,
        tasks: T,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenService>,
        bootstrap: BootstrapPolicy,
    ) -> Self {
        Self {
            gate: AuthGate::new(Arc::clone(&tokens)),
            accounts: AccountService::new(principals, hasher, tokens, bootstrap),
            tasks: TaskService::new(tasks),
        }
    }

    pub fn register(&self, handle: &str, password: &str) -> AuthResult<PrincipalView> {
        self.accounts.register(handle, password)
    }

    pub fn login(&self, handle: &str, password: &str) -> AuthResult<IssuedToken> {
        self.accounts.login(handle, password)
    }

    /// Admin-only.
    pub fn promote(
        &self,
        authorization: Option<&str>,
        target_id: &str,
    ) -> AuthResult<PrincipalView> {
        let ctx = self.admit(authorization)?;
        ctx.require_role(Role::Admin)?;
        self.accounts.promote(target_id)
    }

    pub fn list_tasks(&self, authorization: Option<&str>) -> AuthResult<Vec<TaskView>> {
        let ctx = self.admit(authorization)?;
        let owner = ctx.require_identity()?.principal_id;
        Ok(self
            .tasks
            .list_owned(owner)?
            .iter()
            .map(|task| task.view())
            .collect())
    }

    pub fn get_task(&self, authorization: Option<&str>, id: &str) -> AuthResult<TaskView> {
        let ctx = self.admit(authorization)?;
        let owner = ctx.require_identity()?.principal_id;
        Ok(self.tasks.get_owned(owner, id)?.view())
    }

    pub fn create_task(
        &self,
        authorization: Option<&str>,
        draft: TaskDraft,
    ) -> AuthResult<TaskView> {
        let ctx = self.admit(authorization)?;
        let owner = ctx.require_identity()?.principal_id;
        Ok(self.tasks.create_owned(owner, draft)?.view())
    }

    pub fn update_task(
        &self,
        authorization: Option<&str>,
        id: &str,
        draft: TaskDraft,
    ) -> AuthResult<TaskView> {
        let ctx = self.admit(authorization)?;
        let owner = ctx.require_identity()?.principal_id;
        Ok(self.tasks.update_owned(owner, id, draft)?.view())
    }

    pub fn delete_task(&self, authorization: Option<&str>, id: &str) -> AuthResult<()> {
        let ctx = self.admit(authorization)?;
        let owner = ctx.require_identity()?.principal_id;
        self.tasks.delete_owned(owner, id)
    }

    /// The gate used by the routes, for callers building their own.
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    fn admit(&self, authorization: Option<&str>) -> AuthResult<RequestContext> {
        let mut ctx = RequestContext::new();
        self.gate.admit(&mut ctx, authorization)?;
        Ok(ctx)
    }
}
