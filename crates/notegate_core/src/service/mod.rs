//! Note store use-case services.
//!
//! # Responsibility
//! - Put the security gate between callers and the repository.
//! - Keep the CLI decoupled from storage details.

pub mod note_service;
