//! Typed security failures raised by note validation.
//!
//! # Responsibility
//! - Define the closed threat taxonomy callers branch on.
//! - Carry structured rejection context (`category`, `field`, `detail`).
//!
//! # Invariants
//! - Every detected violation maps to exactly one `ThreatCategory`.
//! - `user_message()` never echoes the matched signature.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Closed set of threat categories recognized by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    SqlInjection,
    XssAttempt,
    CommandInjection,
    PathTraversal,
    RedosRisk,
    ControlCharacter,
    UnicodeSpoofing,
    SizeLimitExceeded,
    ShapeLimitExceeded,
}

impl ThreatCategory {
    /// All categories in declaration order.
    pub const ALL: [ThreatCategory; 9] = [
        Self::SqlInjection,
        Self::XssAttempt,
        Self::CommandInjection,
        Self::PathTraversal,
        Self::RedosRisk,
        Self::ControlCharacter,
        Self::UnicodeSpoofing,
        Self::SizeLimitExceeded,
        Self::ShapeLimitExceeded,
    ];

    /// Stable string id used in log events and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SqlInjection => "sql_injection",
            Self::XssAttempt => "xss_attempt",
            Self::CommandInjection => "command_injection",
            Self::PathTraversal => "path_traversal",
            Self::RedosRisk => "redos_risk",
            Self::ControlCharacter => "control_character",
            Self::UnicodeSpoofing => "unicode_spoofing",
            Self::SizeLimitExceeded => "size_limit_exceeded",
            Self::ShapeLimitExceeded => "shape_limit_exceeded",
        }
    }

    /// Severity reported to the monitor when the validator rejects a note.
    pub fn default_severity(self) -> Severity {
        match self {
            Self::SqlInjection | Self::XssAttempt | Self::CommandInjection | Self::PathTraversal => {
                Severity::High
            }
            Self::RedosRisk
            | Self::ControlCharacter
            | Self::UnicodeSpoofing
            | Self::SizeLimitExceeded
            | Self::ShapeLimitExceeded => Severity::Medium,
        }
    }
}

impl Display for ThreatCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse triage level attached to a violation.
///
/// Ordered from least to most severe so `>=` comparisons work for filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate note field that triggered a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteField {
    Id,
    Title,
    Body,
    Tags,
    Metadata,
}

impl NoteField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Body => "body",
            Self::Tags => "tags",
            Self::Metadata => "metadata",
        }
    }
}

impl Display for NoteField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured rejection returned by `NoteValidator::validate_note`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityError {
    /// Threat category; callers branch on this, never on message text.
    pub category: ThreatCategory,
    /// Input field where the violation was found.
    pub field: NoteField,
    /// Matched signature or limit description, for audit only.
    pub detail: String,
}

impl SecurityError {
    pub fn new(category: ThreatCategory, field: NoteField, detail: impl Into<String>) -> Self {
        Self {
            category,
            field,
            detail: detail.into(),
        }
    }

    /// Severity derived from the error category.
    pub fn severity(&self) -> Severity {
        self.category.default_severity()
    }

    /// Generic user-facing text. Does not reveal which signature matched.
    pub fn user_message(&self) -> &'static str {
        "content rejected by security policy"
    }
}

impl Display for SecurityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "security violation `{}` in field `{}`: {}",
            self.category, self.field, self.detail
        )
    }
}

impl Error for SecurityError {}
