//! Request authorization gate and role checks.
//!
//! # Invariants
//! - Header handling is a linear state machine: missing header, wrong
//!   scheme and bad token each stop the request with `Unauthorized`.
//! - A `RequestContext` carries an identity only after a token validated.
//!   Failed admission leaves it untouched.
//! - Role checks are exact matches. `admin` does not imply `user`.

use crate::auth::token::{SessionClaims, TokenService};
use crate::error::{AuthError, AuthResult, UnauthorizedReason};
use crate::model::id::PrincipalId;
use crate::model::principal::Role;
use log::debug;
use std::sync::Arc;

const BEARER_SCHEME: &str = "bearer";

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub principal_id: PrincipalId,
    pub handle: String,
    pub role: Role,
}

impl From<SessionClaims> for RequestIdentity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            principal_id: claims.user_id,
            handle: claims.username,
            role: claims.role,
        }
    }
}

/// Per-request scratch space. Empty until the gate admits the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    identity: Option<RequestIdentity>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&RequestIdentity> {
        self.identity.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|identity| identity.role)
    }

    /// Identity for handlers behind the gate. `Unauthorized` if the gate
    /// never ran or failed.
    pub fn require_identity(&self) -> AuthResult<&RequestIdentity> {
        self.identity
            .as_ref()
            .ok_or(AuthError::Unauthorized(UnauthorizedReason::MissingHeader))
    }

    /// Role check against the identity stored in this context.
    pub fn require_role(&self, required: Role) -> AuthResult<()> {
        require_role(required, self.role())
    }
}

/// Allows only an exact role match. No identity means deny.
pub fn require_role(required: Role, current: Option<Role>) -> AuthResult<()> {
    match current {
        Some(role) if role == required => Ok(()),
        _ => {
            debug!(
                "event=rbac_denied module=auth status=denied required={required} current={}",
                current.map_or("none", Role::as_str)
            );
            Err(AuthError::Forbidden)
        }
    }
}

/// Converts raw `Authorization` header values into identities.
#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<dyn TokenService>,
}

impl AuthGate {
    pub fn new(tokens: Arc<dyn TokenService>) -> Self {
        Self { tokens }
    }

    /// Runs the header state machine and returns the caller identity.
    pub fn authorize(&self, raw_header: Option<&str>) -> AuthResult<RequestIdentity> {
        let raw_header = raw_header
            .filter(|value| !value.is_empty())
            .ok_or_else(|| reject(UnauthorizedReason::MissingHeader))?;

        let token =
            bearer_token(raw_header).ok_or_else(|| reject(UnauthorizedReason::InvalidScheme))?;

        let claims = self.tokens.validate(token).map_err(|err| {
            debug!("event=gate_reject module=auth status=denied reason=invalid_token detail={err}");
            AuthError::Unauthorized(UnauthorizedReason::InvalidToken)
        })?;

        Ok(claims.into())
    }

    /// Authorizes and, on success only, stores the identity in `ctx`.
    pub fn admit(&self, ctx: &mut RequestContext, raw_header: Option<&str>) -> AuthResult<()> {
        let identity = self.authorize(raw_header)?;
        ctx.identity = Some(identity);
        Ok(())
    }
}

fn reject(reason: UnauthorizedReason) -> AuthError {
    debug!(
        "event=gate_reject module=auth status=denied reason={}",
        match reason {
            UnauthorizedReason::MissingHeader => "missing_header",
            UnauthorizedReason::InvalidScheme => "invalid_scheme",
            UnauthorizedReason::InvalidToken => "invalid_token",
        }
    );
    AuthError::Unauthorized(reason)
}

/// Extracts the token from `Bearer <token>`. Scheme match ignores case.
fn bearer_token(raw_header: &str) -> Option<&str> {
    let (scheme, token) = raw_header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(' ') {
        return None;
    }
    Some(token)
}
