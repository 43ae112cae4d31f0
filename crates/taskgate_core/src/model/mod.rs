//! Domain model for principals and the tasks they own.
//!
//! # Responsibility
//! - Define the canonical records shared by stores, services and callers.
//! - Keep outward views separate from records that carry credential hashes.
//!
//! # Invariants
//! - Every record is identified by a stable, hex-encoded id.
//! - A task's `owner_id` is set once at creation and never reassigned.
//! - `Principal::password_hash` never appears in an outward view.

pub mod id;
pub mod principal;
pub mod task;
