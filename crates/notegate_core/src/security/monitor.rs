//! Threat monitor: bounded audit log of rejected note writes.
//!
//! # Responsibility
//! - Record one `ViolationRecord` per rejection reported by the validator.
//! - Answer filtered queries and aggregate summaries for audit surfaces.
//!
//! # Invariants
//! - `log_violation` never fails and never panics, even on a poisoned lock.
//! - The log never holds more than `capacity` records; the oldest record is
//!   evicted first, in the same critical section as the append.
//! - Stored `note_id`/`detail` text is length-capped, so the monitor cannot be
//!   used as a memory-exhaustion vector.
//! - Query results are ordered oldest first (newest last).

use crate::logging::sanitize_message;
use crate::model::note::now_epoch_ms;
use crate::security::error::{Severity, ThreatCategory};
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_MONITOR_CAPACITY: usize = 1_000;
const MAX_STORED_NOTE_ID_CHARS: usize = 128;
const MAX_STORED_DETAIL_CHARS: usize = 256;
const MAX_LOGGED_DETAIL_CHARS: usize = 160;

static PROCESS_MONITOR: Lazy<Arc<SecurityMonitor>> =
    Lazy::new(|| Arc::new(SecurityMonitor::new(MonitorConfig::default())));

/// Returns the lazily created process-wide monitor.
///
/// Intended for composition roots that have no monitor of their own; tests
/// and embedders should construct a `SecurityMonitor` and inject it.
pub fn process_monitor() -> Arc<SecurityMonitor> {
    Arc::clone(&PROCESS_MONITOR)
}

/// Monitor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Maximum retained records. `0` falls back to the default.
    pub capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MONITOR_CAPACITY,
        }
    }
}

/// Correlation payload supplied with each reported violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationDetails {
    pub note_id: String,
    pub detail: String,
}

impl ViolationDetails {
    pub fn new(note_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            note_id: note_id.into(),
            detail: detail.into(),
        }
    }
}

/// One audit entry describing a rejected write attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Monotonic per-monitor sequence; orders records with equal timestamps.
    pub sequence: u64,
    pub category: ThreatCategory,
    pub severity: Severity,
    pub note_id: String,
    pub detail: String,
    /// Unix epoch milliseconds.
    pub timestamp_ms: i64,
}

/// Query filter for `SecurityMonitor::violations`.
///
/// All set fields must match; the default filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationFilter {
    pub category: Option<ThreatCategory>,
    /// Exact severity match.
    pub severity: Option<Severity>,
    /// Inclusive lower bound on severity.
    pub min_severity: Option<Severity>,
    pub note_id: Option<String>,
    /// Inclusive lower bound, epoch milliseconds.
    pub since_ms: Option<i64>,
    /// Inclusive upper bound, epoch milliseconds.
    pub until_ms: Option<i64>,
}

impl ViolationFilter {
    /// Filter matching a single category.
    pub fn for_category(category: ThreatCategory) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &ViolationRecord) -> bool {
        self.category.map_or(true, |value| record.category == value)
            && self.severity.map_or(true, |value| record.severity == value)
            && self.min_severity.map_or(true, |value| record.severity >= value)
            && self
                .note_id
                .as_deref()
                .map_or(true, |value| record.note_id == value)
            && self.since_ms.map_or(true, |value| record.timestamp_ms >= value)
            && self.until_ms.map_or(true, |value| record.timestamp_ms <= value)
    }
}

/// Aggregate view over the retained audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViolationSummary {
    pub total_by_category: BTreeMap<ThreatCategory, usize>,
    pub total_by_severity: BTreeMap<Severity, usize>,
    pub most_recent_critical: Option<ViolationRecord>,
    /// Records currently retained.
    pub retained: usize,
    /// Records evicted by capacity since the last `clear()`.
    pub evicted: u64,
}

#[derive(Debug, Default)]
struct MonitorState {
    records: VecDeque<ViolationRecord>,
    next_sequence: u64,
    evicted: u64,
}

/// Bounded, thread-safe audit log of security violations.
#[derive(Debug)]
pub struct SecurityMonitor {
    capacity: usize,
    state: Mutex<MonitorState>,
}

impl Default for SecurityMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl SecurityMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let capacity = normalize_capacity(config.capacity);
        Self {
            capacity,
            state: Mutex::new(MonitorState {
                records: VecDeque::with_capacity(capacity.min(DEFAULT_MONITOR_CAPACITY)),
                ..MonitorState::default()
            }),
        }
    }

    /// Appends one violation record, evicting the oldest entry when full.
    pub fn log_violation(
        &self,
        category: ThreatCategory,
        details: ViolationDetails,
        severity: Severity,
    ) {
        let note_id = sanitize_message(&details.note_id, MAX_STORED_NOTE_ID_CHARS);
        let detail = sanitize_message(&details.detail, MAX_STORED_DETAIL_CHARS);

        warn!(
            "event=security_violation module=security status=rejected category={} severity={} note_id={} detail={}",
            category,
            severity,
            note_id,
            sanitize_message(&detail, MAX_LOGGED_DETAIL_CHARS)
        );

        let mut state = self.lock_state();
        let sequence = state.next_sequence;
        state.next_sequence = state.next_sequence.wrapping_add(1);
        while state.records.len() >= self.capacity {
            if state.records.pop_front().is_none() {
                break;
            }
            state.evicted = state.evicted.saturating_add(1);
        }
        state.records.push_back(ViolationRecord {
            sequence,
            category,
            severity,
            note_id,
            detail,
            timestamp_ms: now_epoch_ms(),
        });
    }

    /// Returns records matching `filter`, oldest first.
    pub fn violations(&self, filter: &ViolationFilter) -> Vec<ViolationRecord> {
        self.lock_state()
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    /// Aggregates counts by category and severity over retained records.
    pub fn summary(&self) -> ViolationSummary {
        let state = self.lock_state();
        let mut summary = ViolationSummary {
            retained: state.records.len(),
            evicted: state.evicted,
            ..ViolationSummary::default()
        };

        for record in &state.records {
            *summary
                .total_by_category
                .entry(record.category)
                .or_default() += 1;
            *summary
                .total_by_severity
                .entry(record.severity)
                .or_default() += 1;
        }
        summary.most_recent_critical = state
            .records
            .iter()
            .rev()
            .find(|record| record.severity == Severity::Critical)
            .cloned();

        summary
    }

    /// Empties the log. For test isolation and operational resets.
    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.records.clear();
        state.evicted = 0;
    }

    pub fn len(&self) -> usize {
        self.lock_state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic while holding the lock must not disable auditing.
    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize_capacity(capacity: usize) -> usize {
    if capacity == 0 {
        DEFAULT_MONITOR_CAPACITY
    } else {
        capacity
    }
}
