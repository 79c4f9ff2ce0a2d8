use rosterd::attendance::{self, AttendanceItem};
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn seeded_conn() -> Connection {
    let conn = rosterd::db::open_db(&temp_dir("rosterd-batch")).expect("open db");
    conn.execute(
        "INSERT INTO classes(id, name, created_at) VALUES('c1', '8A', '2026-01-05T00:00:00Z')",
        [],
    )
    .expect("class");
    conn.execute(
        "INSERT INTO students(id, class_id, first_name, last_name, status, sort_order, created_at, updated_at)
         VALUES('s1', 'c1', 'Dana', 'Reyes', 'active', 0, '2026-01-05T00:00:00Z', '2026-01-05T00:00:00Z')",
        [],
    )
    .expect("student");
    conn
}

#[test]
fn malformed_item_does_not_abort_siblings() {
    let conn = seeded_conn();
    let good = AttendanceItem {
        student_id: Some("s1".to_string()),
        date: Some("2026-03-09".to_string()),
        status: Some("present".to_string()),
        notes: None,
    };
    let bad = AttendanceItem {
        student_id: Some("s1".to_string()),
        date: Some("2026-03-10".to_string()),
        status: None,
        notes: None,
    };

    let report = attendance::record_batch(&conn, &[good, bad], None);
    assert_eq!(report.summary.successful, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.total, 2);

    assert!(report.results[0].success);
    assert!(!report.results[1].success);
    assert!(
        report.results[1]
            .error
            .as_deref()
            .unwrap_or("")
            .contains("missing required fields"),
        "failure must carry the validation message"
    );

    // The well-formed item is persisted despite its failed sibling.
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM attendance_records WHERE student_id = 's1' AND date = '2026-03-09'",
            [],
            |r| r.get(0),
        )
        .expect("count");
    assert_eq!(count, 1);
}

#[test]
fn unknown_student_fails_its_item_as_not_found() {
    let conn = seeded_conn();
    let ghost = AttendanceItem {
        student_id: Some("ghost-student".to_string()),
        date: Some("2026-03-09".to_string()),
        status: Some("present".to_string()),
        notes: None,
    };

    let report = attendance::record_batch(&conn, &[ghost], None);
    assert_eq!(report.summary.failed, 1);
    let msg = report.results[0].error.as_deref().unwrap_or("");
    assert!(msg.contains("not found"), "got: {msg}");
    assert!(
        !msg.contains("already recorded"),
        "a missing student is not a duplicate: {msg}"
    );
}

#[test]
fn batch_preserves_item_order_in_results() {
    let conn = seeded_conn();
    let items: Vec<AttendanceItem> = ["2026-03-09", "not-a-date", "2026-03-11"]
        .iter()
        .map(|d| AttendanceItem {
            student_id: Some("s1".to_string()),
            date: Some(d.to_string()),
            status: Some("present".to_string()),
            notes: None,
        })
        .collect();

    let report = attendance::record_batch(&conn, &items, None);
    assert_eq!(report.summary.total, 3);
    assert!(report.results[0].success);
    assert!(!report.results[1].success);
    assert!(report.results[2].success);
    assert_eq!(report.results[2].date.as_deref(), Some("2026-03-11"));
}
