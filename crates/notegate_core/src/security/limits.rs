//! Size, shape and complexity ceilings used by note validation.
//!
//! # Responsibility
//! - Hold every tunable ceiling in one serde-friendly struct.
//! - Reject nonsensical configurations before a validator is built.
//!
//! # Invariants
//! - All ceilings are non-zero.
//! - `redos_min_run <= redos_max_run`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_MAX_ID_CHARS: usize = 128;
pub const DEFAULT_MAX_TITLE_CHARS: usize = 500;
pub const DEFAULT_MAX_BODY_CHARS: usize = 5_000_000;
pub const DEFAULT_MAX_TAGS: usize = 50;
pub const DEFAULT_MAX_TAG_CHARS: usize = 64;
pub const DEFAULT_MAX_METADATA_DEPTH: usize = 16;
pub const DEFAULT_MAX_METADATA_NODES: usize = 10_000;
pub const DEFAULT_REDOS_MIN_RUN: usize = 24;
pub const DEFAULT_REDOS_MAX_RUN: usize = 10_000;

/// Validation ceilings.
///
/// Deserializes with per-field defaults, so partial config documents are
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    pub max_id_chars: usize,
    pub max_title_chars: usize,
    pub max_body_chars: usize,
    pub max_tags: usize,
    pub max_tag_chars: usize,
    pub max_metadata_depth: usize,
    pub max_metadata_nodes: usize,
    /// Repetitive run length that, combined with a nested-quantifier shape,
    /// marks a body as a ReDoS payload.
    pub redos_min_run: usize,
    /// Repetitive run length rejected regardless of shape.
    pub redos_max_run: usize,
    /// Allow TAB, LF and CR in the body. Title, id and tags never allow them.
    pub allow_body_line_breaks: bool,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_id_chars: DEFAULT_MAX_ID_CHARS,
            max_title_chars: DEFAULT_MAX_TITLE_CHARS,
            max_body_chars: DEFAULT_MAX_BODY_CHARS,
            max_tags: DEFAULT_MAX_TAGS,
            max_tag_chars: DEFAULT_MAX_TAG_CHARS,
            max_metadata_depth: DEFAULT_MAX_METADATA_DEPTH,
            max_metadata_nodes: DEFAULT_MAX_METADATA_NODES,
            redos_min_run: DEFAULT_REDOS_MIN_RUN,
            redos_max_run: DEFAULT_REDOS_MAX_RUN,
            allow_body_line_breaks: true,
        }
    }
}

impl ValidationLimits {
    /// Validates configuration invariants.
    pub fn validate(&self) -> Result<(), LimitsError> {
        let ceilings = [
            ("max_id_chars", self.max_id_chars),
            ("max_title_chars", self.max_title_chars),
            ("max_body_chars", self.max_body_chars),
            ("max_tags", self.max_tags),
            ("max_tag_chars", self.max_tag_chars),
            ("max_metadata_depth", self.max_metadata_depth),
            ("max_metadata_nodes", self.max_metadata_nodes),
            ("redos_min_run", self.redos_min_run),
            ("redos_max_run", self.redos_max_run),
        ];
        for (name, value) in ceilings {
            if value == 0 {
                return Err(LimitsError::ZeroCeiling(name));
            }
        }

        if self.redos_min_run > self.redos_max_run {
            return Err(LimitsError::InvertedRedosRuns {
                min_run: self.redos_min_run,
                max_run: self.redos_max_run,
            });
        }

        Ok(())
    }
}

/// Configuration errors for `ValidationLimits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitsError {
    ZeroCeiling(&'static str),
    InvertedRedosRuns { min_run: usize, max_run: usize },
}

impl Display for LimitsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroCeiling(name) => write!(f, "validation limit `{name}` must be non-zero"),
            Self::InvertedRedosRuns { min_run, max_run } => write!(
                f,
                "redos_min_run ({min_run}) must be <= redos_max_run ({max_run})"
            ),
        }
    }
}

impl Error for LimitsError {}

#[cfg(test)]
mod tests {
    use super::{LimitsError, ValidationLimits};

    #[test]
    fn defaults_are_valid() {
        ValidationLimits::default()
            .validate()
            .expect("default limits should validate");
    }

    #[test]
    fn rejects_zero_ceiling() {
        let limits = ValidationLimits {
            max_tags: 0,
            ..ValidationLimits::default()
        };
        assert_eq!(
            limits.validate().unwrap_err(),
            LimitsError::ZeroCeiling("max_tags")
        );
    }

    #[test]
    fn rejects_inverted_redos_runs() {
        let limits = ValidationLimits {
            redos_min_run: 100,
            redos_max_run: 10,
            ..ValidationLimits::default()
        };
        assert!(matches!(
            limits.validate().unwrap_err(),
            LimitsError::InvertedRedosRuns { .. }
        ));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let limits: ValidationLimits =
            serde_json::from_str(r#"{ "max_title_chars": 80 }"#).expect("partial config");
        assert_eq!(limits.max_title_chars, 80);
        assert_eq!(limits.max_body_chars, ValidationLimits::default().max_body_chars);
    }
}
