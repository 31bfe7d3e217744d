//! Domain model for notes entering the security gate.
//!
//! # Responsibility
//! - Define the candidate record validated before persistence.
//!
//! # Invariants
//! - Candidate notes are borrowed during validation and never mutated by it.

pub mod note;
