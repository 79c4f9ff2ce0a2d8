use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::guards;
use crate::auth::middleware::CurrentUser;
use crate::http::error::ApiError;
use crate::http::AppState;

fn student_json(r: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "class_id": r.get::<_, String>(1)?,
        "first_name": r.get::<_, String>(2)?,
        "last_name": r.get::<_, String>(3)?,
        "student_no": r.get::<_, Option<String>>(4)?,
        "status": r.get::<_, String>(5)?,
        "sort_order": r.get::<_, i64>(6)?,
        "created_at": r.get::<_, String>(7)?,
        "updated_at": r.get::<_, String>(8)?,
    }))
}

const STUDENT_COLS: &str =
    "id, class_id, first_name, last_name, student_no, status, sort_order, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub class_id: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.db()?;
    let mut sql = format!("SELECT {STUDENT_COLS} FROM students WHERE 1=1");
    if !q.include_inactive {
        sql.push_str(" AND status = 'active'");
    }
    if q.class_id.is_some() {
        sql.push_str(" AND class_id = ?");
    }
    sql.push_str(" ORDER BY class_id, sort_order");

    let mut stmt = conn.prepare(&sql).map_err(ApiError::from)?;
    let rows = match &q.class_id {
        Some(cid) => stmt.query_map([cid], student_json),
        None => stmt.query_map([], student_json),
    }
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(ApiError::from)?;

    Ok(Json(json!({ "success": true, "data": rows })))
}

pub async fn show(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.db()?;
    let row = conn
        .query_row(
            &format!("SELECT {STUDENT_COLS} FROM students WHERE id = ?"),
            [&id],
            student_json,
        )
        .optional()?;
    match row {
        Some(student) => Ok(Json(json!({ "success": true, "data": student }))),
        None => Err(ApiError::NotFound("student not found".to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct NewStudent {
    pub class_id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub student_no: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<NewStudent>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::Validation(
            "first_name and last_name are required".to_string(),
        ));
    }

    let conn = state.db()?;
    if !class_exists(&conn, &req.class_id)? {
        return Err(ApiError::NotFound("class not found".to_string()));
    }

    let sort_order = match req.sort_order {
        Some(v) => v,
        // Append to the class roster.
        None => conn.query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE class_id = ?",
            [&req.class_id],
            |r| r.get(0),
        )?,
    };
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO students(id, class_id, first_name, last_name, student_no, status, sort_order, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, 'active', ?, ?, ?)",
        (
            &id,
            &req.class_id,
            &req.first_name,
            &req.last_name,
            &req.student_no,
            sort_order,
            &now,
            &now,
        ),
    )?;
    let created = conn.query_row(
        &format!("SELECT {STUDENT_COLS} FROM students WHERE id = ?"),
        [&id],
        student_json,
    )?;
    Ok(Json(json!({ "success": true, "data": created })))
}

/// Enumerated updatable fields. Unknown body keys are ignored, never written.
#[derive(Debug, Deserialize)]
pub struct StudentUpdate {
    pub class_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub student_no: Option<String>,
    pub status: Option<String>,
    pub sort_order: Option<i64>,
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<StudentUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    if let Some(status) = &req.status {
        if status != "active" && status != "inactive" {
            return Err(ApiError::Validation(
                "status must be active or inactive".to_string(),
            ));
        }
    }

    let conn = state.db()?;
    let existing = conn
        .query_row(
            "SELECT class_id, first_name, last_name, student_no, status, sort_order
             FROM students WHERE id = ?",
            [&id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;
    let Some((class_id, first_name, last_name, student_no, status, sort_order)) = existing else {
        return Err(ApiError::NotFound("student not found".to_string()));
    };

    let class_id = req.class_id.unwrap_or(class_id);
    if !class_exists(&conn, &class_id)? {
        return Err(ApiError::NotFound("class not found".to_string()));
    }
    conn.execute(
        "UPDATE students
         SET class_id = ?, first_name = ?, last_name = ?, student_no = ?, status = ?, sort_order = ?, updated_at = ?
         WHERE id = ?",
        (
            &class_id,
            req.first_name.unwrap_or(first_name),
            req.last_name.unwrap_or(last_name),
            req.student_no.or(student_no),
            req.status.unwrap_or(status),
            req.sort_order.unwrap_or(sort_order),
            Utc::now().to_rfc3339(),
            &id,
        ),
    )?;
    let updated = conn.query_row(
        &format!("SELECT {STUDENT_COLS} FROM students WHERE id = ?"),
        [&id],
        student_json,
    )?;
    Ok(Json(json!({ "success": true, "data": updated })))
}

/// Students are never hard-deleted; removal flips the status flag.
pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_admin(&user)?;
    let conn = state.db()?;
    let changed = conn.execute(
        "UPDATE students SET status = 'inactive', updated_at = ? WHERE id = ?",
        (Utc::now().to_rfc3339(), &id),
    )?;
    if changed == 0 {
        return Err(ApiError::NotFound("student not found".to_string()));
    }
    Ok(Json(json!({
        "success": true,
        "data": { "id": id, "status": "inactive" },
        "message": "student deactivated",
    })))
}

fn class_exists(conn: &Connection, class_id: &str) -> Result<bool, ApiError> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}
