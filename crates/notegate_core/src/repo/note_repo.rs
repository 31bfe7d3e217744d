//! Note repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist validated notes in the `notes` table.
//! - Own tag normalization and list pagination rules.
//!
//! # Invariants
//! - The repository never validates content; callers must route writes
//!   through `NoteService`, which runs the security gate first.
//! - Tags are persisted as a JSON array of normalized (lowercase, deduplicated)
//!   names.
//! - Note lists are sorted by `updated_at DESC, id ASC`.

use crate::db::DbError;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const NOTES_DEFAULT_LIMIT: u32 = 10;
const NOTES_LIMIT_MAX: u32 = 50;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    body,
    tags_json,
    metadata_json,
    created_at,
    updated_at
FROM notes";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for note persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(String),
    AlreadyExists(String),
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::AlreadyExists(id) => write!(f, "note already exists: {id}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persisted note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Normalized tag names.
    pub tags: Vec<String>,
    pub metadata: Option<Value>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

/// Query options for note lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// Optional single-tag exact match filter (normalized before use).
    pub tag: Option<String>,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for note persistence.
pub trait NoteRepository {
    /// Inserts a new note; fails with `AlreadyExists` on id conflict.
    fn insert_note(&self, note: &NoteRecord) -> RepoResult<()>;
    /// Replaces title, body, tags, metadata and `updated_at`.
    fn update_note(&self, note: &NoteRecord) -> RepoResult<()>;
    fn get_note(&self, id: &str) -> RepoResult<Option<NoteRecord>>;
    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<NoteRecord>>;
    fn delete_note(&self, id: &str) -> RepoResult<()>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        if !table_exists(conn, "notes")? {
            return Err(RepoError::MissingRequiredTable("notes"));
        }
        Ok(Self { conn })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &NoteRecord) -> RepoResult<()> {
        let changed = self.conn.execute(
            "INSERT INTO notes (
                id,
                title,
                body,
                tags_json,
                metadata_json,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO NOTHING;",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.body.as_str(),
                encode_tags(&note.tags)?,
                encode_metadata(note.metadata.as_ref())?,
                note.created_at,
                note.updated_at,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::AlreadyExists(note.id.clone()));
        }
        Ok(())
    }

    fn update_note(&self, note: &NoteRecord) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET
                title = ?2,
                body = ?3,
                tags_json = ?4,
                metadata_json = ?5,
                updated_at = ?6
             WHERE id = ?1;",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.body.as_str(),
                encode_tags(&note.tags)?,
                encode_metadata(note.metadata.as_ref())?,
                note.updated_at,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(note.id.clone()));
        }
        Ok(())
    }

    fn get_note(&self, id: &str) -> RepoResult<Option<NoteRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_note_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<NoteRecord>> {
        let mut sql = format!("{NOTE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();

        if let Some(tag) = query.tag.as_deref().and_then(normalize_tag) {
            sql.push_str(" AND EXISTS (SELECT 1 FROM json_each(notes.tags_json) WHERE value = ?)");
            bind_values.push(SqlValue::Text(tag));
        }

        sql.push_str(" ORDER BY updated_at DESC, id ASC LIMIT ?");
        bind_values.push(SqlValue::Integer(i64::from(normalize_note_limit(
            query.limit,
        ))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(SqlValue::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn delete_note(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Normalizes list limit according to notes contract.
pub fn normalize_note_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => NOTES_DEFAULT_LIMIT,
        Some(value) => value.min(NOTES_LIMIT_MAX),
    }
}

/// Normalizes one tag value; blank tags yield `None`.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes, deduplicates and sorts tag values.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter_map(|tag| normalize_tag(tag))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<NoteRecord> {
    let id: String = row.get("id")?;
    let tags_json: String = row.get("tags_json")?;
    let tags = serde_json::from_str(&tags_json).map_err(|err| {
        RepoError::InvalidData(format!("invalid tags_json for note `{id}`: {err}"))
    })?;
    let metadata = match row.get::<_, Option<String>>("metadata_json")? {
        Some(text) => Some(serde_json::from_str(&text).map_err(|err| {
            RepoError::InvalidData(format!("invalid metadata_json for note `{id}`: {err}"))
        })?),
        None => None,
    };

    Ok(NoteRecord {
        title: row.get("title")?,
        body: row.get("body")?,
        tags,
        metadata,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        id,
    })
}

fn encode_tags(tags: &[String]) -> RepoResult<String> {
    serde_json::to_string(tags)
        .map_err(|err| RepoError::InvalidData(format!("tags are not serializable: {err}")))
}

fn encode_metadata(metadata: Option<&Value>) -> RepoResult<Option<String>> {
    metadata
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| RepoError::InvalidData(format!("metadata is not serializable: {err}")))
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
