use notegate_core::{
    process_monitor, CandidateNote, MonitorConfig, NoteValidator, SecurityMonitor, Severity,
    ThreatCategory, ViolationDetails, ViolationFilter,
};
use std::sync::Arc;
use std::thread;

fn log(monitor: &SecurityMonitor, category: ThreatCategory, note_id: &str, severity: Severity) {
    monitor.log_violation(category, ViolationDetails::new(note_id, "test detail"), severity);
}

#[test]
fn filters_combine_category_severity_and_note_id() {
    let monitor = SecurityMonitor::default();
    log(&monitor, ThreatCategory::SqlInjection, "a", Severity::High);
    log(&monitor, ThreatCategory::XssAttempt, "a", Severity::High);
    log(&monitor, ThreatCategory::ControlCharacter, "b", Severity::Medium);
    log(&monitor, ThreatCategory::SqlInjection, "b", Severity::Critical);

    let sql = monitor.violations(&ViolationFilter::for_category(ThreatCategory::SqlInjection));
    assert_eq!(sql.len(), 2);

    let high_or_worse = monitor.violations(&ViolationFilter {
        min_severity: Some(Severity::High),
        ..ViolationFilter::default()
    });
    assert_eq!(high_or_worse.len(), 3);

    let exact = monitor.violations(&ViolationFilter {
        category: Some(ThreatCategory::SqlInjection),
        note_id: Some("b".to_string()),
        ..ViolationFilter::default()
    });
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].severity, Severity::Critical);

    let medium = monitor.violations(&ViolationFilter {
        severity: Some(Severity::Medium),
        ..ViolationFilter::default()
    });
    assert_eq!(medium.len(), 1);
    assert_eq!(medium[0].note_id, "b");
}

#[test]
fn time_window_filter_is_inclusive() {
    let monitor = SecurityMonitor::default();
    log(&monitor, ThreatCategory::RedosRisk, "t", Severity::Medium);
    let stamp = monitor.violations(&ViolationFilter::default())[0].timestamp_ms;

    let inside = monitor.violations(&ViolationFilter {
        since_ms: Some(stamp),
        until_ms: Some(stamp),
        ..ViolationFilter::default()
    });
    assert_eq!(inside.len(), 1);

    let after = monitor.violations(&ViolationFilter {
        since_ms: Some(stamp + 1),
        ..ViolationFilter::default()
    });
    assert!(after.is_empty());
}

#[test]
fn summary_counts_retained_and_evicted_records() {
    let monitor = SecurityMonitor::new(MonitorConfig { capacity: 3 });
    log(&monitor, ThreatCategory::SqlInjection, "1", Severity::High);
    log(&monitor, ThreatCategory::SqlInjection, "2", Severity::Critical);
    log(&monitor, ThreatCategory::XssAttempt, "3", Severity::High);
    log(&monitor, ThreatCategory::PathTraversal, "4", Severity::High);

    let summary = monitor.summary();
    assert_eq!(summary.retained, 3);
    assert_eq!(summary.evicted, 1);
    assert_eq!(summary.total_by_category.get(&ThreatCategory::SqlInjection), Some(&1));
    assert_eq!(summary.total_by_category.get(&ThreatCategory::XssAttempt), Some(&1));
    assert_eq!(summary.total_by_severity.get(&Severity::High), Some(&2));
    let critical = summary
        .most_recent_critical
        .expect("critical record should still be retained");
    assert_eq!(critical.note_id, "2");

    let ids: Vec<String> = monitor
        .violations(&ViolationFilter::default())
        .into_iter()
        .map(|record| record.note_id)
        .collect();
    assert_eq!(ids, vec!["2", "3", "4"]);

    monitor.clear();
    let cleared = monitor.summary();
    assert_eq!(cleared.retained, 0);
    assert_eq!(cleared.evicted, 0);
    assert!(cleared.most_recent_critical.is_none());
}

#[test]
fn stored_text_is_sanitized_and_capped() {
    let monitor = SecurityMonitor::default();
    monitor.log_violation(
        ThreatCategory::ControlCharacter,
        ViolationDetails::new("id\nforged", "x".repeat(10_000)),
        Severity::Medium,
    );

    let record = &monitor.violations(&ViolationFilter::default())[0];
    assert_eq!(record.note_id, "id forged");
    assert!(record.detail.chars().count() <= 259);
    assert!(record.detail.ends_with("..."));
}

#[test]
fn concurrent_validators_share_one_audit_log() {
    let monitor = Arc::new(SecurityMonitor::new(MonitorConfig { capacity: 64 }));
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let validator = NoteValidator::with_default_limits(Arc::clone(&monitor));
            thread::spawn(move || {
                for attempt in 0..25 {
                    let note = CandidateNote::with_id(
                        format!("w{worker}-{attempt}"),
                        "title",
                        "<script>alert(1)</script>",
                    );
                    let _ = validator.validate_note(&note);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker should not panic");
    }

    let summary = monitor.summary();
    assert_eq!(summary.retained, 64);
    assert_eq!(summary.evicted, 36);
    assert_eq!(
        summary.total_by_category.get(&ThreatCategory::XssAttempt),
        Some(&64)
    );

    let sequences: Vec<u64> = monitor
        .violations(&ViolationFilter::default())
        .iter()
        .map(|record| record.sequence)
        .collect();
    assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn process_monitor_is_shared() {
    let first = process_monitor();
    let second = process_monitor();
    assert!(Arc::ptr_eq(&first, &second));
}
