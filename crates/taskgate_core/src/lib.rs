//! Core authentication and authorization logic for taskgate.
//! This crate is the single source of truth for identity, role and ownership
//! rules; delivery layers only translate requests into calls on [`TaskGate`].

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use app::{InMemoryTaskGate, SetupError, SqliteTaskGate, TaskGate};
pub use auth::gate::{require_role, AuthGate, RequestContext, RequestIdentity};
pub use auth::password::{Argon2Hasher, CredentialHasher};
pub use auth::token::{
    Clock, IssuedToken, JwtTokenService, ManualClock, SessionClaims, SystemClock, TokenError,
    TokenService,
};
pub use config::{AuthConfig, BootstrapPolicy, ConfigError, HasherConfig, TokenSecret};
pub use error::{AuthError, AuthResult, ErrorBody, UnauthorizedReason};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::id::{IdParseError, PrincipalId, TaskId};
pub use model::principal::{Principal, PrincipalView, Role};
pub use model::task::{Task, TaskDraft, TaskView};
pub use repo::{RepoError, RepoResult};
pub use service::account_service::AccountService;
pub use service::task_service::TaskService;

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
