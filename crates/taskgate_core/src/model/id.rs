//! Opaque hex identifiers.
//!
//! Ids travel as 32 lowercase hex characters (a UUID without hyphens).
//! Parsing is strict: any other shape is rejected so that malformed ids can
//! be reported separately from ids that simply do not exist.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const HEX_ID_LEN: usize = 32;

/// Parse failure for a hex id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    /// Truncated copy of the rejected input, for diagnostics.
    pub input: String,
}

impl Display for IdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid id format: `{}`", self.input)
    }
}

impl Error for IdParseError {}

fn parse_hex_uuid(value: &str) -> Result<Uuid, IdParseError> {
    let reject = || IdParseError {
        input: value.chars().take(HEX_ID_LEN + 8).collect(),
    };
    if value.len() != HEX_ID_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(reject());
    }
    Uuid::try_parse(value).map_err(|_| reject())
}

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parses the 32-character lowercase/uppercase hex form.
            pub fn parse_hex(value: &str) -> Result<Self, IdParseError> {
                parse_hex_uuid(value).map(Self)
            }

            /// Returns the canonical lowercase hex form.
            pub fn to_hex(&self) -> String {
                self.0.simple().to_string()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse_hex(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// Stable identifier of a registered principal.
    PrincipalId
);

hex_id!(
    /// Stable identifier of an owned task.
    TaskId
);
