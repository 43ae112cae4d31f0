//! Registration, login and promotion use cases.
//!
//! # Responsibility
//! - Turn handle/password pairs into stored principals and session tokens.
//! - Assign the bootstrap `admin` role to the first principal only.
//! - Let an admin promote another principal.
//!
//! # Invariants
//! - Login failures are one error value, whatever the cause.
//! - Under `BootstrapPolicy::Atomic`, at most one principal is ever created
//!   as `admin` by registration.
//! - Plaintext passwords never reach the store or the logs.

use crate::auth::password::CredentialHasher;
use crate::auth::token::{IssuedToken, TokenService};
use crate::config::BootstrapPolicy;
use crate::error::{AuthError, AuthResult};
use crate::model::id::PrincipalId;
use crate::model::principal::{Principal, PrincipalView, Role};
use crate::repo::principal_repo::PrincipalRepository;
use log::{info, warn};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Instant;

const DUMMY_PASSWORD: &str = "taskgate-dummy-password";

/// Account workflows over a credential store.
pub struct AccountService<R: PrincipalRepository> {
    repo: R,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenService>,
    bootstrap: BootstrapPolicy,
    // Hash verified against on unknown handles so both login failure paths
    // do the same amount of work.
    dummy_hash: OnceCell<String>,
}

impl<R: PrincipalRepository> AccountService<R> {
    pub fn new(
        repo: R,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenService>,
        bootstrap: BootstrapPolicy,
    ) -> Self {
        Self {
            repo,
            hasher,
            tokens,
            bootstrap,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Registers a new principal.
    ///
    /// The first principal in an empty store becomes `admin`; everyone else
    /// becomes `user`.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty handle or password.
    /// - `DuplicateHandle` when the handle is taken.
    pub fn register(&self, handle: &str, password: &str) -> AuthResult<PrincipalView> {
        let started_at = Instant::now();
        let handle = normalize_handle(handle)?;
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password is required"));
        }

        if self.repo.find_by_handle(handle)?.is_some() {
            info!("event=register module=account status=rejected reason=duplicate_handle");
            return Err(AuthError::DuplicateHandle);
        }

        let password_hash = self.hasher.hash(password)?;
        let candidate = Principal::new(handle, password_hash, Role::User);

        let stored = match self.bootstrap {
            BootstrapPolicy::Atomic => self.repo.create_with_bootstrap_role(&candidate)?,
            BootstrapPolicy::CheckThenAct => self.register_check_then_act(candidate)?,
        };

        info!(
            "event=register module=account status=ok principal_id={} role={} policy={:?} duration_ms={}",
            stored.id,
            stored.role,
            self.bootstrap,
            started_at.elapsed().as_millis()
        );
        Ok(stored.view())
    }

    // Count and insert are separate store calls; concurrent callers can all
    // see an empty store.
    fn register_check_then_act(&self, mut candidate: Principal) -> AuthResult<Principal> {
        let existing = self.repo.count()?;
        candidate.role = if existing == 0 {
            Role::Admin
        } else {
            Role::User
        };
        self.repo.create(&candidate)?;
        Ok(candidate)
    }

    /// Verifies credentials and issues a session token.
    ///
    /// # Errors
    /// - `InvalidCredentials` for an unknown handle and for a wrong password.
    pub fn login(&self, handle: &str, password: &str) -> AuthResult<IssuedToken> {
        let started_at = Instant::now();
        let principal = self.repo.find_by_handle(handle.trim())?;

        let Some(principal) = principal else {
            self.burn_dummy_verify(password);
            info!(
                "event=login module=account status=rejected duration_ms={}",
                started_at.elapsed().as_millis()
            );
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &principal.password_hash)? {
            info!(
                "event=login module=account status=rejected duration_ms={}",
                started_at.elapsed().as_millis()
            );
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self
            .tokens
            .issue(principal.id, &principal.handle, principal.role)?;
        info!(
            "event=login module=account status=ok principal_id={} role={} duration_ms={}",
            principal.id,
            principal.role,
            started_at.elapsed().as_millis()
        );
        Ok(issued)
    }

    /// Grants `admin` to the principal with the given hex id.
    ///
    /// Promoting an existing admin succeeds without a write. The caller's own
    /// role is checked by the gate, not here.
    ///
    /// # Errors
    /// - `InvalidIdentifier` for a malformed id.
    /// - `NotFound` when no principal has that id.
    pub fn promote(&self, target_id: &str) -> AuthResult<PrincipalView> {
        let id = PrincipalId::parse_hex(target_id.trim())?;
        let mut principal = self.repo.find_by_id(id)?.ok_or(AuthError::NotFound)?;

        if principal.role == Role::Admin {
            return Ok(principal.view());
        }

        principal.role = Role::Admin;
        self.repo.update(&principal)?;
        info!("event=promote module=account status=ok principal_id={id}");
        Ok(principal.view())
    }

    fn burn_dummy_verify(&self, password: &str) {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hasher.hash(DUMMY_PASSWORD));
        match dummy {
            Ok(hash) => {
                let _ = self.hasher.verify(password, hash);
            }
            Err(err) => {
                warn!("event=login module=account status=degraded reason=dummy_hash_failed error={err}");
            }
        }
    }
}

fn normalize_handle(handle: &str) -> AuthResult<&str> {
    let handle = handle.trim();
    if handle.is_empty() {
        return Err(AuthError::InvalidInput("username is required"));
    }
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::AccountService;
    use crate::auth::password::{Argon2Hasher, CredentialHasher};
    use crate::auth::token::{JwtTokenService, TokenService};
    use crate::config::{BootstrapPolicy, HasherConfig, TokenSecret};
    use crate::error::AuthError;
    use crate::model::principal::Role;
    use crate::repo::memory::InMemoryPrincipalRepository;
    use std::sync::Arc;
    use std::time::Duration;

    fn service(policy: BootstrapPolicy) -> AccountService<InMemoryPrincipalRepository> {
        let hasher: Arc<dyn CredentialHasher> = Arc::new(
            Argon2Hasher::new(HasherConfig {
                memory_kib: 256,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap(),
        );
        let secret = TokenSecret::new(vec![7u8; 32]).unwrap();
        let tokens: Arc<dyn TokenService> =
            Arc::new(JwtTokenService::new(&secret, Duration::from_secs(3600)).unwrap());
        AccountService::new(InMemoryPrincipalRepository::new(), hasher, tokens, policy)
    }

    #[test]
    fn first_registration_is_admin_then_users() {
        for policy in [BootstrapPolicy::Atomic, BootstrapPolicy::CheckThenAct] {
            let accounts = service(policy);
            assert_eq!(accounts.register("alice", "pw").unwrap().role, Role::Admin);
            assert_eq!(accounts.register("bob", "pw").unwrap().role, Role::User);
        }
    }

    #[test]
    fn handles_are_trimmed_and_must_be_present() {
        let accounts = service(BootstrapPolicy::Atomic);
        assert_eq!(accounts.register("  alice ", "pw").unwrap().username, "alice");
        assert_eq!(
            accounts.register("alice", "other").unwrap_err(),
            AuthError::DuplicateHandle
        );
        assert!(matches!(
            accounts.register("   ", "pw"),
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            accounts.register("carol", ""),
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[test]
    fn login_failures_are_indistinguishable() {
        let accounts = service(BootstrapPolicy::Atomic);
        accounts.register("alice", "correct").unwrap();

        let wrong_password = accounts.login("alice", "incorrect").unwrap_err();
        let unknown_handle = accounts.login("mallory", "correct").unwrap_err();
        assert_eq!(wrong_password, AuthError::InvalidCredentials);
        assert_eq!(wrong_password, unknown_handle);
        assert_eq!(wrong_password.body(), unknown_handle.body());
    }

    #[test]
    fn promote_is_idempotent_and_validates_ids() {
        let accounts = service(BootstrapPolicy::Atomic);
        accounts.register("root", "pw").unwrap();
        let bob = accounts.register("bob", "pw").unwrap();

        let hex = bob.id.to_hex();
        assert_eq!(accounts.promote(&hex).unwrap().role, Role::Admin);
        assert_eq!(accounts.promote(&hex).unwrap().role, Role::Admin);

        assert_eq!(
            accounts.promote("not-hex").unwrap_err(),
            AuthError::InvalidIdentifier
        );
        assert_eq!(
            accounts
                .promote("0123456789abcdef0123456789abcdef")
                .unwrap_err(),
            AuthError::NotFound
        );
    }
}
