//! Content security validation and threat monitoring.
//!
//! # Responsibility
//! - Gate every candidate note before it reaches storage.
//! - Keep an auditable, bounded trail of rejected writes.
//!
//! # Invariants
//! - Validation is synchronous, side-effect free apart from the monitor
//!   report, and linear in input length.
//! - No backtracking regex engine ever sees attacker-controlled text.

pub mod decode;
pub mod error;
pub mod limits;
pub mod monitor;
pub mod patterns;
pub mod validator;
