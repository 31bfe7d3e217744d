//! Repository layer for the note store collaborator.
//!
//! # Responsibility
//! - Define the note data access contract.
//! - Keep SQLite query details out of service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `AlreadyExists`) in
//!   addition to DB transport errors.
//! - Content validation is not a repository concern; see `NoteService`.

pub mod note_repo;
