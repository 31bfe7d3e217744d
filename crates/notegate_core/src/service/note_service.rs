//! Note use-case service guarded by the security validator.
//!
//! # Responsibility
//! - Provide create/update/get/list/delete APIs for notes.
//! - Run `NoteValidator::validate_note` on every write before storage is
//!   touched.
//!
//! # Invariants
//! - A rejected write performs no SQL and surfaces as
//!   `NoteServiceError::Rejected`.
//! - Tags are normalized only after validation passed, so the validator
//!   always sees caller input verbatim.
//! - `update_note` uses full content replacement and keeps `created_at`.

use crate::model::note::{now_epoch_ms, CandidateNote};
use crate::repo::note_repo::{
    normalize_note_limit, normalize_tags, NoteListQuery, NoteRecord, NoteRepository, RepoError,
    RepoResult,
};
use crate::security::error::SecurityError;
use crate::security::validator::NoteValidator;
use log::info;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// The security gate rejected the write.
    Rejected(SecurityError),
    NoteNotFound(String),
    NoteAlreadyExists(String),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Write succeeded but read-back did not match.
    InconsistentState(&'static str),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(err) => write!(f, "{err}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::NoteAlreadyExists(id) => write!(f, "note already exists: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent note state: {details}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NoteNotFound(id),
            RepoError::AlreadyExists(id) => Self::NoteAlreadyExists(id),
            other => Self::Repo(other),
        }
    }
}

impl From<SecurityError> for NoteServiceError {
    fn from(value: SecurityError) -> Self {
        Self::Rejected(value)
    }
}

/// Replacement content for an existing note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteWrite {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub metadata: Option<Value>,
}

impl NoteWrite {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    fn into_candidate(self, id: &str) -> CandidateNote {
        let mut candidate = CandidateNote::with_id(id, self.title, self.body);
        candidate.tags = self.tags;
        candidate.metadata = self.metadata;
        candidate
    }
}

/// List result envelope used by service callers.
#[derive(Debug, Clone, PartialEq)]
pub struct NotesListResult {
    /// Sorted by `updated_at DESC, id ASC`.
    pub items: Vec<NoteRecord>,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
}

/// Note service facade: validator in front, repository behind.
pub struct NoteService<R: NoteRepository> {
    repo: R,
    validator: NoteValidator,
}

impl<R: NoteRepository> NoteService<R> {
    pub fn new(repo: R, validator: NoteValidator) -> Self {
        Self { repo, validator }
    }

    pub fn validator(&self) -> &NoteValidator {
        &self.validator
    }

    /// Validates and persists a new note.
    pub fn create_note(&self, candidate: &CandidateNote) -> Result<NoteRecord, NoteServiceError> {
        self.validator.validate_note(candidate)?;

        let record = NoteRecord {
            id: candidate.id.clone(),
            title: candidate.title.clone(),
            body: candidate.body.clone(),
            tags: normalize_tags(&candidate.tags),
            metadata: candidate.metadata.clone(),
            created_at: candidate.created_at,
            updated_at: candidate.updated_at,
        };
        self.repo.insert_note(&record)?;
        info!("event=note_write module=service status=ok op=create");

        self.repo
            .get_note(&record.id)?
            .ok_or(NoteServiceError::InconsistentState(
                "created note not found in read-back",
            ))
    }

    /// Validates replacement content and overwrites an existing note.
    pub fn update_note(&self, id: &str, write: NoteWrite) -> Result<NoteRecord, NoteServiceError> {
        let candidate = write.into_candidate(id);
        self.validator.validate_note(&candidate)?;

        let existing = self
            .repo
            .get_note(id)?
            .ok_or_else(|| NoteServiceError::NoteNotFound(id.to_string()))?;
        let record = NoteRecord {
            id: existing.id,
            title: candidate.title,
            body: candidate.body,
            tags: normalize_tags(&candidate.tags),
            metadata: candidate.metadata,
            created_at: existing.created_at,
            updated_at: now_epoch_ms().max(existing.updated_at),
        };
        self.repo.update_note(&record)?;
        info!("event=note_write module=service status=ok op=update");

        self.repo
            .get_note(id)?
            .ok_or(NoteServiceError::InconsistentState(
                "updated note not found in read-back",
            ))
    }

    pub fn get_note(&self, id: &str) -> RepoResult<Option<NoteRecord>> {
        self.repo.get_note(id)
    }

    /// Lists notes using optional single-tag filter and pagination.
    pub fn list_notes(
        &self,
        tag: Option<&str>,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<NotesListResult, NoteServiceError> {
        let applied_limit = normalize_note_limit(limit);
        let items = self.repo.list_notes(&NoteListQuery {
            tag: tag.map(str::to_string),
            limit: Some(applied_limit),
            offset,
        })?;
        Ok(NotesListResult {
            items,
            applied_limit,
        })
    }

    pub fn delete_note(&self, id: &str) -> Result<(), NoteServiceError> {
        self.repo.delete_note(id)?;
        info!("event=note_write module=service status=ok op=delete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{NoteService, NoteServiceError, NoteWrite};
    use crate::db::open_db_in_memory;
    use crate::model::note::CandidateNote;
    use crate::repo::note_repo::SqliteNoteRepository;
    use crate::security::error::ThreatCategory;
    use crate::security::monitor::SecurityMonitor;
    use crate::security::validator::NoteValidator;
    use std::sync::Arc;

    fn validator() -> NoteValidator {
        NoteValidator::with_default_limits(Arc::new(SecurityMonitor::default()))
    }

    #[test]
    fn create_normalizes_tags_after_validation() {
        let conn = open_db_in_memory().expect("in-memory db should open");
        let repo = SqliteNoteRepository::try_new(&conn).expect("repo should construct");
        let service = NoteService::new(repo, validator());

        let candidate =
            CandidateNote::with_id("n-1", "Groceries", "milk").with_tags([" Home ", "home", "TODO"]);
        let stored = service
            .create_note(&candidate)
            .expect("benign note should persist");
        assert_eq!(stored.tags, vec!["home", "todo"]);
        assert_eq!(stored.created_at, candidate.created_at);
    }

    #[test]
    fn rejected_update_keeps_previous_content() {
        let conn = open_db_in_memory().expect("in-memory db should open");
        let repo = SqliteNoteRepository::try_new(&conn).expect("repo should construct");
        let service = NoteService::new(repo, validator());

        service
            .create_note(&CandidateNote::with_id("n-2", "Plan", "ship it"))
            .expect("benign note should persist");

        let err = service
            .update_note("n-2", NoteWrite::new("Plan", "<script>alert(1)</script>"))
            .expect_err("script body should be rejected");
        assert!(matches!(
            err,
            NoteServiceError::Rejected(ref security) if security.category == ThreatCategory::XssAttempt
        ));

        let stored = service
            .get_note("n-2")
            .expect("read should succeed")
            .expect("note should still exist");
        assert_eq!(stored.body, "ship it");
    }

    #[test]
    fn update_of_missing_note_reports_not_found() {
        let conn = open_db_in_memory().expect("in-memory db should open");
        let repo = SqliteNoteRepository::try_new(&conn).expect("repo should construct");
        let service = NoteService::new(repo, validator());

        let err = service
            .update_note("missing", NoteWrite::new("t", "b"))
            .expect_err("missing note should fail");
        assert!(matches!(err, NoteServiceError::NoteNotFound(id) if id == "missing"));
    }
}
