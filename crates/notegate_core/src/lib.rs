//! Content security gate for personal note stores.
//! This crate is the single source of truth for note security invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod security;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::note::CandidateNote;
pub use repo::note_repo::{
    NoteListQuery, NoteRecord, NoteRepository, RepoError, RepoResult, SqliteNoteRepository,
};
pub use security::error::{NoteField, SecurityError, Severity, ThreatCategory};
pub use security::limits::{LimitsError, ValidationLimits};
pub use security::monitor::{
    process_monitor, MonitorConfig, SecurityMonitor, ViolationDetails, ViolationFilter,
    ViolationRecord, ViolationSummary,
};
pub use security::validator::NoteValidator;
pub use service::note_service::{NoteService, NoteServiceError, NoteWrite, NotesListResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
