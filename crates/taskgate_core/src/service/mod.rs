//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, hasher and token calls into use-case level APIs.
//! - Keep delivery layers (CLI, HTTP adapters) decoupled from storage details.

pub mod account_service;
pub mod task_service;
