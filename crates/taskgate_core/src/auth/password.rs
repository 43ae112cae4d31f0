//! One-way credential hashing.
//!
//! # Invariants
//! - Output is a PHC string carrying algorithm, parameters and salt, so
//!   verification keeps working after the configured work factor changes.
//! - `verify` answers `Ok(false)` for a wrong password; it errors only when
//!   the stored hash cannot be parsed.
//! - Plaintext never reaches logs or errors.

use crate::config::{ConfigError, HasherConfig};
use crate::error::{AuthError, AuthResult};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};

const SALT_BYTES: usize = 16;

/// Capability for hashing and checking credentials.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> AuthResult<String>;
    fn verify(&self, plaintext: &str, stored_hash: &str) -> AuthResult<bool>;
}

/// Argon2id hasher with a configurable work factor.
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Builds a hasher, rejecting parameters Argon2 cannot run with.
    pub fn new(config: HasherConfig) -> Result<Self, ConfigError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|err| ConfigError::InvalidHasherParams(err.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_BYTES];
        getrandom::getrandom(&mut salt_bytes)
            .map_err(|err| AuthError::internal("salt_generation", err))?;
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|err| AuthError::internal("salt_encoding", err))?;

        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|err| AuthError::internal("password_hash", err))?;
        Ok(hash.to_string())
    }

    fn verify(&self, plaintext: &str, stored_hash: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|err| AuthError::internal("malformed_password_hash", err))?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::internal("password_verify", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Argon2Hasher, CredentialHasher};
    use crate::config::{ConfigError, HasherConfig};
    use crate::error::AuthError;

    fn fast_hasher() -> Argon2Hasher {
        Argon2Hasher::new(HasherConfig {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn hash_round_trips_and_rejects_other_passwords() {
        let hasher = fast_hasher();
        let hash = hasher.hash("my_secret_password").unwrap();

        assert_ne!(hash, "my_secret_password");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("my_secret_password", &hash).unwrap());
        assert!(!hasher.verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn round_trip_holds_across_varied_passwords() {
        let hasher = fast_hasher();
        let long = "x".repeat(4096);
        let passwords = [
            " ",
            "a",
            "pass word with spaces",
            "trailing\n",
            "\0nul\0inside",
            "p\u{e4}ssw\u{f6}rd",
            "\u{5bc6}\u{7801}\u{1f511}",
            "$argon2id$v=19$m=256,t=1,p=1$looks$phc",
            long.as_str(),
        ];

        for password in passwords {
            let hash = hasher.hash(password).unwrap();
            assert!(hasher.verify(password, &hash).unwrap(), "{password:?}");
            for other in passwords.iter().filter(|other| **other != password) {
                assert!(!hasher.verify(other, &hash).unwrap(), "{other:?}");
            }
        }
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let hasher = fast_hasher();
        let a = hasher.hash("pw").unwrap();
        let b = hasher.hash("pw").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("pw", &a).unwrap());
        assert!(hasher.verify("pw", &b).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error_not_false() {
        let hasher = fast_hasher();
        let err = hasher.verify("pw", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[test]
    fn hashes_from_a_different_work_factor_still_verify() {
        let strong = Argon2Hasher::new(HasherConfig {
            memory_kib: 512,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let hash = strong.hash("pw").unwrap();
        assert!(fast_hasher().verify("pw", &hash).unwrap());
    }

    #[test]
    fn invalid_work_factor_is_rejected_at_construction() {
        let result = Argon2Hasher::new(HasherConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(matches!(result, Err(ConfigError::InvalidHasherParams(_))));
    }
}
