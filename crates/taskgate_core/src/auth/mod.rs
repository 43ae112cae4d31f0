//! Authentication and authorization primitives.
//!
//! # Responsibility
//! - Hash and verify credentials (`password`).
//! - Issue and validate session tokens (`token`).
//! - Turn a raw `Authorization` header into a request identity and enforce
//!   role requirements (`gate`).

pub mod gate;
pub mod password;
pub mod token;
