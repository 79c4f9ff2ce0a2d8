//! Attendance recording. Enforces at most one record per (student, date):
//! the caller holds the connection exclusively for the whole
//! check-then-write sequence, and the UNIQUE(student_id, date) constraint
//! backstops it. Batch submission is iteration over the single-item
//! procedure; one bad item never aborts its siblings.

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::is_constraint_violation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }

    pub fn parse(s: &str) -> Option<AttendanceStatus> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            "excused" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }
}

/// One submitted item, fields optional so missing input is reported as a
/// validation failure rather than a deserialization error.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceItem {
    pub student_id: Option<String>,
    pub date: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertAction {
    Created,
    Updated,
}

#[derive(Debug, Serialize)]
pub struct UpsertOutcome {
    pub id: String,
    pub action: UpsertAction,
    pub student_id: String,
    pub date: String,
}

#[derive(Debug)]
pub enum UpsertError {
    Validation(String),
    NotFound(String),
    Duplicate(String),
    Db(rusqlite::Error),
}

impl UpsertError {
    fn message(&self) -> String {
        match self {
            UpsertError::Validation(m)
            | UpsertError::NotFound(m)
            | UpsertError::Duplicate(m) => m.clone(),
            UpsertError::Db(e) => e.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<UpsertAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub results: Vec<ItemOutcome>,
    pub summary: BatchSummary,
}

fn validate_item(item: &AttendanceItem) -> Result<(String, String, AttendanceStatus), UpsertError> {
    let (Some(student_id), Some(date), Some(status)) = (
        item.student_id.as_deref().filter(|s| !s.is_empty()),
        item.date.as_deref().filter(|s| !s.is_empty()),
        item.status.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return Err(UpsertError::Validation(
            "missing required fields: student_id, date and status".to_string(),
        ));
    };
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(UpsertError::Validation(format!(
            "date must be YYYY-MM-DD, got '{date}'"
        )));
    }
    let status = AttendanceStatus::parse(status).ok_or_else(|| {
        UpsertError::Validation(
            "status must be one of present, absent, late, excused".to_string(),
        )
    })?;
    Ok((student_id.to_string(), date.to_string(), status))
}

/// Records or corrects one student's attendance for one date.
pub fn upsert_one(
    conn: &Connection,
    item: &AttendanceItem,
    recorded_by: Option<&str>,
) -> Result<UpsertOutcome, UpsertError> {
    let (student_id, date, status) = validate_item(item)?;

    let student_exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM students WHERE id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(UpsertError::Db)?;
    if student_exists.is_none() {
        return Err(UpsertError::NotFound(format!(
            "student {student_id} not found"
        )));
    }

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM attendance_records WHERE student_id = ? AND date = ?",
            (&student_id, &date),
            |r| r.get(0),
        )
        .optional()
        .map_err(UpsertError::Db)?;

    let now = Utc::now().to_rfc3339();
    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE attendance_records
                 SET status = ?, notes = ?, recorded_by = ?, updated_at = ?
                 WHERE id = ?",
                (status.as_str(), &item.notes, recorded_by, &now, &id),
            )
            .map_err(UpsertError::Db)?;
            Ok(UpsertOutcome {
                id,
                action: UpsertAction::Updated,
                student_id,
                date,
            })
        }
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO attendance_records(id, student_id, date, status, notes, recorded_by, created_at, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    &student_id,
                    &date,
                    status.as_str(),
                    &item.notes,
                    recorded_by,
                    &now,
                    &now,
                ),
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    UpsertError::Duplicate(format!(
                        "attendance for student {student_id} on {date} already recorded"
                    ))
                } else {
                    UpsertError::Db(e)
                }
            })?;
            Ok(UpsertOutcome {
                id,
                action: UpsertAction::Created,
                student_id,
                date,
            })
        }
    }
}

/// Applies `upsert_one` to each item independently and aggregates.
pub fn record_batch(
    conn: &Connection,
    items: &[AttendanceItem],
    recorded_by: Option<&str>,
) -> BatchReport {
    let results: Vec<ItemOutcome> = items
        .iter()
        .map(|item| match upsert_one(conn, item, recorded_by) {
            Ok(outcome) => ItemOutcome {
                success: true,
                id: Some(outcome.id),
                action: Some(outcome.action),
                student_id: Some(outcome.student_id),
                date: Some(outcome.date),
                error: None,
            },
            Err(e) => ItemOutcome {
                success: false,
                id: None,
                action: None,
                student_id: item.student_id.clone(),
                date: item.date.clone(),
                error: Some(e.message()),
            },
        })
        .collect();
    let successful = results.iter().filter(|r| r.success).count();
    let failed = results.len() - successful;
    BatchReport {
        summary: BatchSummary {
            successful,
            failed,
            total: results.len(),
        },
        results,
    }
}

/// Stamps every active student of a class as present for the given date.
pub fn mark_all_present(
    conn: &Connection,
    class_id: &str,
    date: &str,
    notes: Option<&str>,
    recorded_by: Option<&str>,
) -> Result<BatchReport, UpsertError> {
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(UpsertError::Validation(format!(
            "date must be YYYY-MM-DD, got '{date}'"
        )));
    }
    let class_exists: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(UpsertError::Db)?;
    if class_exists.is_none() {
        return Err(UpsertError::NotFound("class not found".to_string()));
    }

    let mut stmt = conn
        .prepare(
            "SELECT id FROM students
             WHERE class_id = ? AND status = 'active'
             ORDER BY sort_order",
        )
        .map_err(UpsertError::Db)?;
    let student_ids = stmt
        .query_map([class_id], |r| r.get::<_, String>(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(UpsertError::Db)?;

    let items: Vec<AttendanceItem> = student_ids
        .into_iter()
        .map(|sid| AttendanceItem {
            student_id: Some(sid),
            date: Some(date.to_string()),
            status: Some(AttendanceStatus::Present.as_str().to_string()),
            notes: notes.map(|n| n.to_string()),
        })
        .collect();
    Ok(record_batch(conn, &items, recorded_by))
}

/// Guarded status correction by record id. Validates the status before
/// touching the row; zero rows affected means the id does not exist.
pub fn update_record(
    conn: &Connection,
    id: &str,
    status: &str,
    notes: Option<&str>,
) -> Result<(), UpsertError> {
    let status = AttendanceStatus::parse(status).ok_or_else(|| {
        UpsertError::Validation(
            "status must be one of present, absent, late, excused".to_string(),
        )
    })?;
    let now = Utc::now().to_rfc3339();
    let changed = match notes {
        Some(notes) => conn
            .execute(
                "UPDATE attendance_records SET status = ?, notes = ?, updated_at = ? WHERE id = ?",
                (status.as_str(), notes, &now, id),
            )
            .map_err(UpsertError::Db)?,
        None => conn
            .execute(
                "UPDATE attendance_records SET status = ?, updated_at = ? WHERE id = ?",
                (status.as_str(), &now, id),
            )
            .map_err(UpsertError::Db)?,
    };
    if changed == 0 {
        return Err(UpsertError::NotFound(
            "attendance record not found".to_string(),
        ));
    }
    Ok(())
}

/// Hard delete by record id, unlike students which are soft-deleted.
pub fn delete_record(conn: &Connection, id: &str) -> Result<(), UpsertError> {
    let changed = conn
        .execute("DELETE FROM attendance_records WHERE id = ?", [id])
        .map_err(UpsertError::Db)?;
    if changed == 0 {
        return Err(UpsertError::NotFound(
            "attendance record not found".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct AttendanceRow {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub date: String,
    pub status: String,
    pub notes: Option<String>,
    pub recorded_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Register view: all records for a class, optionally narrowed to one date.
pub fn list_records(
    conn: &Connection,
    class_id: &str,
    date: Option<&str>,
) -> rusqlite::Result<Vec<AttendanceRow>> {
    let base = "SELECT a.id, a.student_id, s.last_name, s.first_name, a.date, a.status,
                       a.notes, a.recorded_by, a.created_at, a.updated_at
                FROM attendance_records a
                JOIN students s ON s.id = a.student_id
                WHERE s.class_id = ?";
    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<AttendanceRow> {
        let last: String = r.get(2)?;
        let first: String = r.get(3)?;
        Ok(AttendanceRow {
            id: r.get(0)?,
            student_id: r.get(1)?,
            student_name: format!("{}, {}", last, first),
            date: r.get(4)?,
            status: r.get(5)?,
            notes: r.get(6)?,
            recorded_by: r.get(7)?,
            created_at: r.get(8)?,
            updated_at: r.get(9)?,
        })
    };
    match date {
        Some(d) => {
            let sql = format!("{base} AND a.date = ? ORDER BY a.date, s.sort_order");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map((class_id, d), map_row)?;
            rows.collect()
        }
        None => {
            let sql = format!("{base} ORDER BY a.date, s.sort_order");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([class_id], map_row)?;
            rows.collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
        let conn = crate::db::open_db(&temp_dir("rosterd-attendance-unit")).expect("open db");
        conn.execute(
            "INSERT INTO classes(id, name, created_at) VALUES('c1', '7B', '2026-01-01T00:00:00Z')",
            [],
        )
        .expect("insert class");
        conn.execute(
            "INSERT INTO students(id, class_id, first_name, last_name, status, sort_order, created_at, updated_at)
             VALUES('s1', 'c1', 'Avery', 'Stone', 'active', 0, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        )
        .expect("insert student");
        conn
    }

    fn item(student: &str, date: &str, status: &str) -> AttendanceItem {
        AttendanceItem {
            student_id: Some(student.to_string()),
            date: Some(date.to_string()),
            status: Some(status.to_string()),
            notes: None,
        }
    }

    #[test]
    fn status_parsing_is_closed() {
        assert_eq!(
            AttendanceStatus::parse("late"),
            Some(AttendanceStatus::Late)
        );
        assert_eq!(AttendanceStatus::parse("tardy"), None);
        assert_eq!(AttendanceStatus::parse(""), None);
    }

    #[test]
    fn missing_fields_and_bad_values_fail_validation() {
        let conn = seeded_conn();
        let no_status = AttendanceItem {
            student_id: Some("s1".to_string()),
            date: Some("2026-03-02".to_string()),
            status: None,
            notes: None,
        };
        assert!(matches!(
            upsert_one(&conn, &no_status, None),
            Err(UpsertError::Validation(_))
        ));
        assert!(matches!(
            upsert_one(&conn, &item("s1", "03/02/2026", "present"), None),
            Err(UpsertError::Validation(_))
        ));
        assert!(matches!(
            upsert_one(&conn, &item("s1", "2026-03-02", "tardy"), None),
            Err(UpsertError::Validation(_))
        ));
    }

    #[test]
    fn unknown_student_is_rejected_before_insert() {
        let conn = seeded_conn();
        let err = upsert_one(&conn, &item("ghost", "2026-03-02", "present"), None)
            .expect_err("unknown student");
        assert!(matches!(err, UpsertError::NotFound(_)));
    }

    #[test]
    fn second_upsert_converges_to_one_record() {
        let conn = seeded_conn();
        let first = upsert_one(&conn, &item("s1", "2026-03-02", "absent"), None).expect("first");
        assert_eq!(first.action, UpsertAction::Created);
        let second = upsert_one(&conn, &item("s1", "2026-03-02", "late"), None).expect("second");
        assert_eq!(second.action, UpsertAction::Updated);
        assert_eq!(second.id, first.id);

        let (count, status): (i64, String) = conn
            .query_row(
                "SELECT COUNT(*), MAX(status) FROM attendance_records WHERE student_id = 's1' AND date = '2026-03-02'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .expect("count");
        assert_eq!(count, 1);
        assert_eq!(status, "late");
    }

    #[test]
    fn unique_constraint_maps_to_duplicate() {
        let conn = seeded_conn();
        conn.execute(
            "INSERT INTO attendance_records(id, student_id, date, status, created_at, updated_at)
             VALUES('r1', 's1', '2026-03-02', 'present', '2026-03-02T08:00:00Z', '2026-03-02T08:00:00Z')",
            [],
        )
        .expect("seed record");
        let err = conn
            .execute(
                "INSERT INTO attendance_records(id, student_id, date, status, created_at, updated_at)
                 VALUES('r2', 's1', '2026-03-02', 'late', '2026-03-02T09:00:00Z', '2026-03-02T09:00:00Z')",
                [],
            )
            .expect_err("constraint");
        assert!(is_constraint_violation(&err));
        // The engine sees the existing row and updates instead.
        let outcome = upsert_one(&conn, &item("s1", "2026-03-02", "late"), None).expect("upsert");
        assert_eq!(outcome.action, UpsertAction::Updated);
        assert_eq!(outcome.id, "r1");
    }
}
