//! Note validator: the security gate in front of every note write.
//!
//! # Responsibility
//! - Run the pattern library against a candidate note in a fixed order.
//! - Report each rejection to the injected `SecurityMonitor`.
//!
//! # Invariants
//! - A note is either fully accepted (`Ok(())`) or rejected with exactly one
//!   `SecurityError`; checks short-circuit on the first violation.
//! - Evaluation order is fixed: shape/size, control characters, unicode
//!   spoofing, then path traversal, SQL, command and XSS scans over the
//!   original text followed by one decoded copy, then ReDoS.
//! - The candidate is never mutated; decoding works on scratch copies and is
//!   limited to exactly one pass.
//! - Total work is linear in input size.

use crate::model::note::CandidateNote;
use crate::security::decode::decode_once;
use crate::security::error::{NoteField, SecurityError, ThreatCategory};
use crate::security::limits::{LimitsError, ValidationLimits};
use crate::security::monitor::{SecurityMonitor, ViolationDetails};
use crate::security::patterns::{
    detect_command_injection, detect_control_character, detect_metadata_shape,
    detect_path_in_id, detect_path_traversal, detect_redos_risk, detect_sql_injection,
    detect_unicode_spoofing, detect_xss, exceeds_char_limit, Signature,
};
use log::debug;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

/// Validates candidate notes and reports rejections.
#[derive(Debug, Clone)]
pub struct NoteValidator {
    limits: ValidationLimits,
    monitor: Arc<SecurityMonitor>,
}

impl NoteValidator {
    /// Builds a validator after checking `limits`.
    pub fn new(
        limits: ValidationLimits,
        monitor: Arc<SecurityMonitor>,
    ) -> Result<Self, LimitsError> {
        limits.validate()?;
        Ok(Self { limits, monitor })
    }

    /// Builds a validator with default limits.
    pub fn with_default_limits(monitor: Arc<SecurityMonitor>) -> Self {
        Self {
            limits: ValidationLimits::default(),
            monitor,
        }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    pub fn monitor(&self) -> &Arc<SecurityMonitor> {
        &self.monitor
    }

    /// Validates one candidate note.
    ///
    /// On rejection, one record is appended to the monitor before the error
    /// is returned.
    pub fn validate_note(&self, note: &CandidateNote) -> Result<(), SecurityError> {
        let started_at = Instant::now();
        match self.check_note(note) {
            Ok(()) => {
                debug!(
                    "event=note_validate module=security status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                self.monitor.log_violation(
                    err.category,
                    ViolationDetails::new(
                        note.id.as_str(),
                        format!("{}: {}", err.field, err.detail),
                    ),
                    err.severity(),
                );
                debug!(
                    "event=note_validate module=security status=rejected category={} field={} duration_ms={}",
                    err.category,
                    err.field,
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    /// Runs the full pipeline without reporting to the monitor.
    pub fn check_note(&self, note: &CandidateNote) -> Result<(), SecurityError> {
        self.check_shape(note)?;
        self.check_control_characters(note)?;
        check_unicode(note)?;

        let original = ContentView::original(note);
        check_content(&original)?;
        if let Some(decoded) = ContentView::decoded(note) {
            check_content(&decoded)?;
        }

        self.check_redos(note)
    }

    fn check_shape(&self, note: &CandidateNote) -> Result<(), SecurityError> {
        let limits = &self.limits;

        if note.id.trim().is_empty() {
            return Err(SecurityError::new(
                ThreatCategory::ShapeLimitExceeded,
                NoteField::Id,
                "id_empty",
            ));
        }
        check_length(NoteField::Id, "id_length", &note.id, limits.max_id_chars)?;
        check_length(
            NoteField::Title,
            "title_length",
            &note.title,
            limits.max_title_chars,
        )?;
        check_length(
            NoteField::Body,
            "body_length",
            &note.body,
            limits.max_body_chars,
        )?;

        if note.tags.len() > limits.max_tags {
            return Err(SecurityError::new(
                ThreatCategory::ShapeLimitExceeded,
                NoteField::Tags,
                format!("tag_count {} exceeds {}", note.tags.len(), limits.max_tags),
            ));
        }
        for (index, tag) in note.tags.iter().enumerate() {
            if exceeds_char_limit(tag, limits.max_tag_chars) {
                return Err(SecurityError::new(
                    ThreatCategory::SizeLimitExceeded,
                    NoteField::Tags,
                    format!("tag_length exceeds {} (tag {index})", limits.max_tag_chars),
                ));
            }
        }

        if let Some(metadata) = note.metadata.as_ref() {
            if let Some(signature) = detect_metadata_shape(
                metadata,
                limits.max_metadata_depth,
                limits.max_metadata_nodes,
            ) {
                return Err(SecurityError::new(
                    ThreatCategory::ShapeLimitExceeded,
                    NoteField::Metadata,
                    signature,
                ));
            }
        }
        Ok(())
    }

    fn check_control_characters(&self, note: &CandidateNote) -> Result<(), SecurityError> {
        let strict = |text: &str| detect_control_character(text, false);
        let category = ThreatCategory::ControlCharacter;

        if let Some(signature) = strict(&note.id) {
            return Err(SecurityError::new(category, NoteField::Id, signature));
        }
        if let Some(signature) = strict(&note.title) {
            return Err(SecurityError::new(category, NoteField::Title, signature));
        }
        if let Some(signature) =
            detect_control_character(&note.body, self.limits.allow_body_line_breaks)
        {
            return Err(SecurityError::new(category, NoteField::Body, signature));
        }
        if let Some((index, signature)) = first_tag_hit(note.tags.iter(), strict) {
            return Err(tag_violation(category, signature, index, false));
        }
        Ok(())
    }

    fn check_redos(&self, note: &CandidateNote) -> Result<(), SecurityError> {
        match detect_redos_risk(
            &note.body,
            self.limits.redos_min_run,
            self.limits.redos_max_run,
        ) {
            Some(signature) => Err(SecurityError::new(
                ThreatCategory::RedosRisk,
                NoteField::Body,
                signature,
            )),
            None => Ok(()),
        }
    }
}

/// Text of one candidate, either as submitted or with one encoding layer
/// removed.
struct ContentView<'a> {
    id: Cow<'a, str>,
    title: Cow<'a, str>,
    body: Cow<'a, str>,
    tags: Vec<Cow<'a, str>>,
    decoded: bool,
}

impl<'a> ContentView<'a> {
    fn original(note: &'a CandidateNote) -> Self {
        Self {
            id: Cow::Borrowed(note.id.as_str()),
            title: Cow::Borrowed(note.title.as_str()),
            body: Cow::Borrowed(note.body.as_str()),
            tags: note.tags.iter().map(|tag| Cow::Borrowed(tag.as_str())).collect(),
            decoded: false,
        }
    }

    /// Returns `None` when no field contains a decodable escape.
    fn decoded(note: &'a CandidateNote) -> Option<Self> {
        let view = Self {
            id: decode_once(&note.id),
            title: decode_once(&note.title),
            body: decode_once(&note.body),
            tags: note.tags.iter().map(|tag| decode_once(tag)).collect(),
            decoded: true,
        };
        let changed = [&view.id, &view.title, &view.body]
            .into_iter()
            .chain(view.tags.iter())
            .any(|text| matches!(text, Cow::Owned(_)));
        changed.then_some(view)
    }

    fn violation(
        &self,
        category: ThreatCategory,
        field: NoteField,
        signature: Signature,
    ) -> SecurityError {
        let detail = if self.decoded {
            format!("{signature} (decoded)")
        } else {
            signature.to_string()
        };
        SecurityError::new(category, field, detail)
    }
}

fn check_content(view: &ContentView<'_>) -> Result<(), SecurityError> {
    if let Some(signature) = detect_path_in_id(&view.id) {
        return Err(view.violation(ThreatCategory::PathTraversal, NoteField::Id, signature));
    }
    if let Some(signature) = detect_path_traversal(&view.body) {
        return Err(view.violation(ThreatCategory::PathTraversal, NoteField::Body, signature));
    }

    for (field, text) in [
        (NoteField::Id, &view.id),
        (NoteField::Title, &view.title),
        (NoteField::Body, &view.body),
    ] {
        if let Some(signature) = detect_sql_injection(text) {
            return Err(view.violation(ThreatCategory::SqlInjection, field, signature));
        }
    }

    if let Some(signature) = detect_command_injection(&view.body) {
        return Err(view.violation(
            ThreatCategory::CommandInjection,
            NoteField::Body,
            signature,
        ));
    }

    for (field, text) in [(NoteField::Title, &view.title), (NoteField::Body, &view.body)] {
        if let Some(signature) = detect_xss(text) {
            return Err(view.violation(ThreatCategory::XssAttempt, field, signature));
        }
    }
    if let Some((index, signature)) = first_tag_hit(view.tags.iter(), detect_xss) {
        return Err(tag_violation(
            ThreatCategory::XssAttempt,
            signature,
            index,
            view.decoded,
        ));
    }

    Ok(())
}

fn check_unicode(note: &CandidateNote) -> Result<(), SecurityError> {
    let category = ThreatCategory::UnicodeSpoofing;
    for (field, text) in [
        (NoteField::Id, &note.id),
        (NoteField::Title, &note.title),
        (NoteField::Body, &note.body),
    ] {
        if let Some(signature) = detect_unicode_spoofing(text) {
            return Err(SecurityError::new(category, field, signature));
        }
    }
    if let Some((index, signature)) = first_tag_hit(note.tags.iter(), detect_unicode_spoofing) {
        return Err(tag_violation(category, signature, index, false));
    }
    Ok(())
}

fn check_length(
    field: NoteField,
    name: &str,
    text: &str,
    max_chars: usize,
) -> Result<(), SecurityError> {
    if exceeds_char_limit(text, max_chars) {
        return Err(SecurityError::new(
            ThreatCategory::SizeLimitExceeded,
            field,
            format!("{name} exceeds {max_chars}"),
        ));
    }
    Ok(())
}

fn first_tag_hit<I, T, F>(tags: I, detector: F) -> Option<(usize, Signature)>
where
    I: Iterator<Item = T>,
    T: AsRef<str>,
    F: Fn(&str) -> Option<Signature>,
{
    tags.enumerate()
        .find_map(|(index, tag)| detector(tag.as_ref()).map(|signature| (index, signature)))
}

fn tag_violation(
    category: ThreatCategory,
    signature: Signature,
    index: usize,
    decoded: bool,
) -> SecurityError {
    let suffix = if decoded { ", decoded" } else { "" };
    SecurityError::new(
        category,
        NoteField::Tags,
        format!("{signature} (tag {index}{suffix})"),
    )
}
