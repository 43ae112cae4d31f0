//! Signed session tokens.
//!
//! # Responsibility
//! - Issue HS256 tokens embedding identity, handle, role and expiry.
//! - Validate tokens and fail closed on any defect.
//!
//! # Invariants
//! - Only HS256 is accepted. The header algorithm is checked before any
//!   signature work, so `none` or asymmetric headers never reach the verifier.
//! - A token is expired once `now >= exp`; there is no leeway.
//! - Claims are a snapshot taken at issuance and are never refreshed.

use crate::config::{check_token_ttl, ConfigError, TokenSecret};
use crate::model::id::PrincipalId;
use crate::model::principal::Role;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Source of "now" in unix seconds.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn starting_at(unix_secs: i64) -> Self {
        Self {
            now: AtomicI64::new(unix_secs),
        }
    }

    pub fn set(&self, unix_secs: i64) {
        self.now.store(unix_secs, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let secs = i64::try_from(by.as_secs()).unwrap_or(i64::MAX);
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(secs))
            });
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Claims carried inside a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: PrincipalId,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly issued token and its embedded expiry (unix seconds).
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    UnsupportedAlgorithm,
    Expired { expired_at: i64, now: i64 },
    /// Issuance failed; not caused by the caller.
    Encoding(String),
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed token"),
            Self::BadSignature => write!(f, "token signature mismatch"),
            Self::UnsupportedAlgorithm => write!(f, "unsupported token algorithm"),
            Self::Expired { expired_at, now } => {
                write!(f, "token expired at {expired_at}, now {now}")
            }
            Self::Encoding(details) => write!(f, "token encoding failed: {details}"),
        }
    }
}

impl Error for TokenError {}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::UnsupportedAlgorithm
            }
            _ => Self::Malformed,
        }
    }
}

/// Capability for issuing and validating session tokens.
pub trait TokenService: Send + Sync {
    fn issue(&self, id: PrincipalId, handle: &str, role: Role) -> Result<IssuedToken, TokenError>;
    fn validate(&self, token: &str) -> Result<SessionClaims, TokenError>;
}

/// HS256 JWT implementation.
pub struct JwtTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtTokenService {
    /// Fails when `ttl` is zero or longer than [`crate::config::MAX_TOKEN_TTL`].
    pub fn new(secret: &TokenSecret, ttl: Duration) -> Result<Self, ConfigError> {
        Self::with_clock(secret, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        secret: &TokenSecret,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: check_token_ttl(ttl)?,
            clock,
        })
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // Expiry is checked against the injected clock with strict `>=`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, id: PrincipalId, handle: &str, role: Role) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now_unix();
        let ttl_secs = i64::try_from(self.ttl.as_secs())
            .map_err(|_| TokenError::Encoding("token lifetime out of range".to_string()))?;
        let exp = now
            .checked_add(ttl_secs)
            .ok_or_else(|| TokenError::Encoding("token expiry out of range".to_string()))?;
        let claims = SessionClaims {
            user_id: id,
            username: handle.to_string(),
            role,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &self.encoding_key,
        )
        .map_err(|err| TokenError::Encoding(err.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    fn validate(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let header = jsonwebtoken::decode_header(token)?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &Self::validation())?;
        let claims = data.claims;

        let now = self.clock.now_unix();
        if now >= claims.exp {
            return Err(TokenError::Expired {
                expired_at: claims.exp,
                now,
            });
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::{JwtTokenService, ManualClock, TokenError, TokenService};
    use crate::config::{check_token_ttl, ConfigError, TokenSecret};
    use crate::model::id::PrincipalId;
    use crate::model::principal::Role;
    use std::sync::Arc;
    use std::time::Duration;

    fn secret() -> TokenSecret {
        TokenSecret::new("test_secret_key_for_jwt_0123456789".as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn issued_claims_round_trip() {
        let clock = Arc::new(ManualClock::starting_at(1_700_000_000));
        let service =
            JwtTokenService::with_clock(&secret(), Duration::from_secs(3600), clock).unwrap();
        let id = PrincipalId::generate();

        let issued = service.issue(id, "testuser", Role::Admin).unwrap();
        assert_eq!(issued.expires_at, 1_700_003_600);

        let claims = service.validate(&issued.token).unwrap();
        assert_eq!(claims.user_id, id);
        assert_eq!(claims.username, "testuser");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp, issued.expires_at);
    }

    #[test]
    fn expiry_is_exclusive() {
        let clock = Arc::new(ManualClock::starting_at(1_000));
        let service =
            JwtTokenService::with_clock(&secret(), Duration::from_secs(60), clock.clone())
                .unwrap();
        let issued = service
            .issue(PrincipalId::generate(), "u", Role::User)
            .unwrap();

        clock.set(1_059);
        assert!(service.validate(&issued.token).is_ok());

        clock.set(1_060);
        assert_eq!(
            service.validate(&issued.token).unwrap_err(),
            TokenError::Expired {
                expired_at: 1_060,
                now: 1_060
            }
        );
    }

    #[test]
    fn zero_and_overflowing_lifetimes_are_rejected() {
        for ttl in [Duration::ZERO, Duration::from_secs(u64::MAX)] {
            assert!(matches!(
                JwtTokenService::new(&secret(), ttl),
                Err(ConfigError::InvalidTokenTtl { .. })
            ));
        }
    }

    #[test]
    fn expiry_near_end_of_time_is_an_error_not_a_wrap() {
        let clock = Arc::new(ManualClock::starting_at(i64::MAX - 10));
        let service =
            JwtTokenService::with_clock(&secret(), Duration::from_secs(60), clock).unwrap();
        assert!(matches!(
            service.issue(PrincipalId::generate(), "u", Role::User),
            Err(TokenError::Encoding(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let service = JwtTokenService::new(&secret(), Duration::from_secs(60)).unwrap();
        assert_eq!(
            service.validate("this.is.a.bad.token").unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(service.validate("").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn issued_token_debug_hides_token() {
        let service = JwtTokenService::new(&secret(), Duration::from_secs(60)).unwrap();
        let issued = service
            .issue(PrincipalId::generate(), "u", Role::User)
            .unwrap();
        assert!(!format!("{issued:?}").contains(&issued.token));
    }
}
