use rosterd::attendance::{self, AttendanceItem, UpsertAction};
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
    let conn = rosterd::db::open_db(&temp_dir("rosterd-mark-all")).expect("open db");
    conn.execute(
        "INSERT INTO classes(id, name, created_at) VALUES('c1', '8A', '2026-01-05T00:00:00Z')",
        [],
    )
    .expect("class");
    for (id, order, status) in [
        ("s1", 0, "active"),
        ("s2", 1, "active"),
        ("s3", 2, "active"),
        ("s4", 3, "inactive"),
    ] {
        conn.execute(
            "INSERT INTO students(id, class_id, first_name, last_name, status, sort_order, created_at, updated_at)
             VALUES(?, 'c1', 'First', 'Last', ?, ?, '2026-01-05T00:00:00Z', '2026-01-05T00:00:00Z')",
            (id, status, order),
        )
        .expect("student");
    }
    conn
}

#[test]
fn stamps_every_active_student_regardless_of_prior_state() {
    let conn = seeded_conn();

    // One student already has a non-present record for the day.
    let prior = AttendanceItem {
        student_id: Some("s2".to_string()),
        date: Some("2026-03-09".to_string()),
        status: Some("absent".to_string()),
        notes: None,
    };
    attendance::upsert_one(&conn, &prior, None).expect("prior record");

    let report =
        attendance::mark_all_present(&conn, "c1", "2026-03-09", Some("assembly day"), None)
            .expect("mark all present");
    assert_eq!(report.summary.successful, 3);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.total, 3, "inactive students are skipped");

    let updated = report
        .results
        .iter()
        .find(|r| r.student_id.as_deref() == Some("s2"))
        .expect("s2 outcome");
    assert_eq!(updated.action, Some(UpsertAction::Updated));

    let (count, present): (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), SUM(status = 'present') FROM attendance_records WHERE date = '2026-03-09'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .expect("rows");
    assert_eq!(count, 3);
    assert_eq!(present, 3, "every stamped record ends up present");

    let none_for_inactive: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM attendance_records WHERE student_id = 's4'",
            [],
            |r| r.get(0),
        )
        .expect("count");
    assert_eq!(none_for_inactive, 0);
}

#[test]
fn unknown_class_is_rejected() {
    let conn = seeded_conn();
    let err = attendance::mark_all_present(&conn, "nope", "2026-03-09", None, None)
        .expect_err("unknown class");
    assert!(matches!(err, attendance::UpsertError::NotFound(_)));

    let err = attendance::mark_all_present(&conn, "c1", "March 9", None, None)
        .expect_err("bad date");
    assert!(matches!(err, attendance::UpsertError::Validation(_)));
}
