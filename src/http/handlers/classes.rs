use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::guards;
use crate::auth::middleware::CurrentUser;
use crate::http::error::ApiError;
use crate::http::AppState;

pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.db()?;
    let mut stmt = conn
        .prepare(
            "SELECT c.id, c.name, c.created_at,
                    (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id AND s.status = 'active')
             FROM classes c
             ORDER BY c.name",
        )
        .map_err(ApiError::from)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "created_at": r.get::<_, String>(2)?,
                "active_students": r.get::<_, i64>(3)?,
            }))
        })
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
    let class = conn
        .query_row(
            "SELECT id, name, created_at FROM classes WHERE id = ?",
            [&id],
            |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "name": r.get::<_, String>(1)?,
                    "created_at": r.get::<_, String>(2)?,
                }))
            },
        )
        .optional()?;
    let Some(mut class) = class else {
        return Err(ApiError::NotFound("class not found".to_string()));
    };

    let mut stmt = conn
        .prepare(
            "SELECT id, first_name, last_name, student_no, sort_order
             FROM students WHERE class_id = ? AND status = 'active'
             ORDER BY sort_order",
        )
        .map_err(ApiError::from)?;
    let roster = stmt
        .query_map([&id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "first_name": r.get::<_, String>(1)?,
                "last_name": r.get::<_, String>(2)?,
                "student_no": r.get::<_, Option<String>>(3)?,
                "sort_order": r.get::<_, i64>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(ApiError::from)?;
    class["students"] = json!(roster);
    Ok(Json(json!({ "success": true, "data": class })))
}

#[derive(Debug, Deserialize)]
pub struct NewClass {
    pub name: String,
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<NewClass>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }
    let conn = state.db()?;
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO classes(id, name, created_at) VALUES(?, ?, ?)",
        (&id, req.name.trim(), &now),
    )?;
    Ok(Json(json!({
        "success": true,
        "data": { "id": id, "name": req.name.trim(), "created_at": now },
    })))
}
