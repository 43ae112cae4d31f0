//! Startup configuration.
//!
//! # Responsibility
//! - Collect the signing secret, token lifetime, hashing work factor and
//!   bootstrap policy in one value handed to constructors.
//! - Fail at startup with a diagnosable error instead of panicking later.
//!
//! # Invariants
//! - The secret is at least `MIN_SECRET_BYTES` long and never printed.
//! - Configuration is read once; nothing looks up the environment mid-request.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_JWT_SECRET: &str = "TASKGATE_JWT_SECRET";
pub const ENV_TOKEN_TTL_HOURS: &str = "TASKGATE_TOKEN_TTL_HOURS";
pub const ENV_HASH_MEMORY_KIB: &str = "TASKGATE_HASH_MEMORY_KIB";
pub const ENV_HASH_ITERATIONS: &str = "TASKGATE_HASH_ITERATIONS";
pub const ENV_HASH_PARALLELISM: &str = "TASKGATE_HASH_PARALLELISM";
pub const ENV_BOOTSTRAP_POLICY: &str = "TASKGATE_BOOTSTRAP_POLICY";

pub const MIN_SECRET_BYTES: usize = 32;
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 72;
const MAX_TOKEN_TTL_HOURS: u64 = 720;
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(MAX_TOKEN_TTL_HOURS * 3600);

/// HMAC signing secret. `Debug` never shows the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort {
                actual: bytes.len(),
                minimum: MIN_SECRET_BYTES,
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenSecret(<{} bytes redacted>)", self.0.len())
    }
}

/// Argon2id work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasherConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// How the first registered principal becomes admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootstrapPolicy {
    /// The store decides the role in the same step as the insert.
    #[default]
    Atomic,
    /// Count first, insert later. Racy: concurrent first registrations can
    /// all observe an empty store and all become admin. Kept only to
    /// reproduce legacy behavior.
    CheckThenAct,
}

impl BootstrapPolicy {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "atomic" => Ok(Self::Atomic),
            "check_then_act" => Ok(Self::CheckThenAct),
            other => Err(ConfigError::InvalidValue {
                key: ENV_BOOTSTRAP_POLICY,
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub token_secret: TokenSecret,
    pub token_ttl: Duration,
    pub hasher: HasherConfig,
    pub bootstrap: BootstrapPolicy,
}

impl AuthConfig {
    /// Config with defaults for everything but the secret.
    pub fn new(token_secret: TokenSecret) -> Self {
        Self {
            token_secret,
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_HOURS * 3600),
            hasher: HasherConfig::default(),
            bootstrap: BootstrapPolicy::default(),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Result<Self, ConfigError> {
        self.token_ttl = check_token_ttl(ttl)?;
        Ok(self)
    }

    pub fn with_hasher(mut self, hasher: HasherConfig) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: BootstrapPolicy) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, treating blank values as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let secret = get(ENV_JWT_SECRET).ok_or(ConfigError::MissingSecret)?;
        let mut config = Self::new(TokenSecret::new(secret.into_bytes())?);

        if let Some(raw) = get(ENV_TOKEN_TTL_HOURS) {
            let hours = parse_number::<u64>(ENV_TOKEN_TTL_HOURS, &raw)?;
            let ttl = hours
                .checked_mul(3600)
                .map(Duration::from_secs)
                .and_then(|ttl| check_token_ttl(ttl).ok())
                .ok_or(ConfigError::InvalidValue {
                    key: ENV_TOKEN_TTL_HOURS,
                    value: raw,
                })?;
            config.token_ttl = ttl;
        }
        if let Some(raw) = get(ENV_HASH_MEMORY_KIB) {
            config.hasher.memory_kib = parse_number(ENV_HASH_MEMORY_KIB, &raw)?;
        }
        if let Some(raw) = get(ENV_HASH_ITERATIONS) {
            config.hasher.iterations = parse_number(ENV_HASH_ITERATIONS, &raw)?;
        }
        if let Some(raw) = get(ENV_HASH_PARALLELISM) {
            config.hasher.parallelism = parse_number(ENV_HASH_PARALLELISM, &raw)?;
        }
        if let Some(raw) = get(ENV_BOOTSTRAP_POLICY) {
            config.bootstrap = BootstrapPolicy::parse(&raw)?;
        }

        Ok(config)
    }
}

/// Accepts a token lifetime of at least one second and at most
/// [`MAX_TOKEN_TTL`].
pub fn check_token_ttl(ttl: Duration) -> Result<Duration, ConfigError> {
    if ttl.as_secs() == 0 || ttl > MAX_TOKEN_TTL {
        return Err(ConfigError::InvalidTokenTtl { secs: ttl.as_secs() });
    }
    Ok(ttl)
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingSecret,
    SecretTooShort { actual: usize, minimum: usize },
    InvalidValue { key: &'static str, value: String },
    /// Token lifetime outside `1s..=MAX_TOKEN_TTL`.
    InvalidTokenTtl { secs: u64 },
    InvalidHasherParams(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSecret => write!(f, "{ENV_JWT_SECRET} is not set"),
            Self::SecretTooShort { actual, minimum } => write!(
                f,
                "{ENV_JWT_SECRET} is {actual} bytes; at least {minimum} are required"
            ),
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
            Self::InvalidTokenTtl { secs } => write!(
                f,
                "token lifetime of {secs}s is outside 1s..={}s",
                MAX_TOKEN_TTL.as_secs()
            ),
            Self::InvalidHasherParams(details) => {
                write!(f, "invalid password hashing parameters: {details}")
            }
        }
    }
}

impl Error for ConfigError {}
