//! Outward error taxonomy.
//!
//! Every variant maps to exactly one status and one code string, no matter
//! which operation produced it. Two variants merge cases:
//! `InvalidCredentials` (unknown handle or wrong password) and `NotFound`
//! (absent or owned by someone else).

use crate::auth::token::TokenError;
use crate::model::id::IdParseError;
use crate::model::task::TaskValidationError;
use crate::repo::RepoError;
use log::error;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AuthResult<T> = Result<T, AuthError>;

/// Why the gate refused a request. All reasons share the `Unauthorized`
/// status; the reason only selects the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    MissingHeader,
    InvalidScheme,
    InvalidToken,
}

impl UnauthorizedReason {
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingHeader => "authorization header required",
            Self::InvalidScheme => "invalid token format",
            Self::InvalidToken => "invalid or expired token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    DuplicateHandle,
    InvalidCredentials,
    Unauthorized(UnauthorizedReason),
    Forbidden,
    NotFound,
    InvalidIdentifier,
    InvalidInput(&'static str),
    /// Store or crypto failure. The message is for logs, not for callers.
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateHandle => "duplicate_handle",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::InvalidIdentifier => "invalid_identifier",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP-equivalent status for delivery layers.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::DuplicateHandle => 409,
            Self::InvalidCredentials => 401,
            Self::Unauthorized(_) => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::InvalidIdentifier => 400,
            Self::InvalidInput(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Message safe to show callers. Internal details are withheld.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::DuplicateHandle => "username already exists",
            Self::InvalidCredentials => "invalid username or password",
            Self::Unauthorized(reason) => reason.message(),
            Self::Forbidden => "forbidden: insufficient permissions",
            Self::NotFound => "not found",
            Self::InvalidIdentifier => "invalid id format",
            Self::InvalidInput(message) => message,
            Self::Internal(_) => "internal error",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code().to_string(),
            message: self.public_message().to_string(),
        }
    }

    pub(crate) fn internal(context: &str, err: impl Display) -> Self {
        error!("event=internal_error module=core status=error context={context} error={err}");
        Self::Internal(format!("{context}: {err}"))
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal(details) => write!(f, "internal: {details}"),
            other => write!(f, "{}: {}", other.code(), other.public_message()),
        }
    }
}

impl Error for AuthError {}

/// Outward error shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<RepoError> for AuthError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateHandle(_) => Self::DuplicateHandle,
            RepoError::NotFound(_) => Self::NotFound,
            other => Self::internal("repository", other),
        }
    }
}

impl From<IdParseError> for AuthError {
    fn from(_: IdParseError) -> Self {
        Self::InvalidIdentifier
    }
}

impl From<TaskValidationError> for AuthError {
    fn from(value: TaskValidationError) -> Self {
        Self::InvalidInput(value.as_str())
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Encoding(details) => Self::internal("token_encoding", details),
            _ => Self::Unauthorized(UnauthorizedReason::InvalidToken),
        }
    }
}
