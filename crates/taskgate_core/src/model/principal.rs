//! Principal (registered user) model.
//!
//! # Invariants
//! - `handle` is unique across the credential store.
//! - `password_hash` is a PHC string and is never serialized outward;
//!   `Principal` does not implement `Serialize`.
//! - Role changes only through promotion.

use crate::model::id::PrincipalId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse authorization role. There is no hierarchy between roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Stable string used in storage and token claims.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Parses the stable string form. Matching is exact.
    pub fn parse(value: &str) -> Result<Self, RoleParseError> {
        match value {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleParseError(pub String);

impl Display for RoleParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown role `{}`", self.0)
    }
}

impl Error for RoleParseError {}

/// Stored principal record, including the credential hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub handle: String,
    pub password_hash: String,
    pub role: Role,
}

impl Principal {
    /// Creates a principal with a freshly generated id.
    pub fn new(handle: impl Into<String>, password_hash: impl Into<String>, role: Role) -> Self {
        Self {
            id: PrincipalId::generate(),
            handle: handle.into(),
            password_hash: password_hash.into(),
            role,
        }
    }

    /// Returns the outward projection without the credential hash.
    pub fn view(&self) -> PrincipalView {
        PrincipalView {
            id: self.id,
            username: self.handle.clone(),
            role: self.role,
        }
    }
}

// Keeps the hash out of debug logs and panic messages.
impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Outward view of a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalView {
    pub id: PrincipalId,
    pub username: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::{Principal, Role};

    #[test]
    fn role_round_trips_through_stable_strings() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert_eq!(Role::parse("user").unwrap(), Role::User);
        assert!(Role::parse("Admin").is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn view_and_debug_never_carry_the_hash() {
        let principal = Principal::new("alice", "$argon2id$v=19$secret-material", Role::User);
        let json = serde_json::to_string(&principal.view()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"username\":\"alice\""));
        assert!(json.contains("\"role\":\"user\""));

        let debug = format!("{principal:?}");
        assert!(!debug.contains("secret-material"));
    }
}
