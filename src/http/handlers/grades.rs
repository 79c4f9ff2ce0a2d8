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

pub async fn list_subjects(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.db()?;
    let mut stmt = conn
        .prepare("SELECT id, name FROM subjects ORDER BY name")
        .map_err(ApiError::from)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({ "id": r.get::<_, String>(0)?, "name": r.get::<_, String>(1)? }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(ApiError::from)?;
    Ok(Json(json!({ "success": true, "data": rows })))
}

#[derive(Debug, Deserialize)]
pub struct NewSubject {
    pub name: String,
}

pub async fn create_subject(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<NewSubject>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }
    let conn = state.db()?;
    let id = Uuid::new_v4().to_string();
    // subjects.name is UNIQUE; a repeat lands in the Duplicate arm.
    conn.execute(
        "INSERT INTO subjects(id, name) VALUES(?, ?)",
        (&id, name),
    )
    .map_err(|e| {
        if crate::db::is_constraint_violation(&e) {
            ApiError::Duplicate(format!("subject '{name}' already exists"))
        } else {
            ApiError::from(e)
        }
    })?;
    Ok(Json(json!({ "success": true, "data": { "id": id, "name": name } })))
}

pub async fn list_for_student(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(student_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.db()?;
    let student: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [&student_id], |r| {
            r.get(0)
        })
        .optional()?;
    if student.is_none() {
        return Err(ApiError::NotFound("student not found".to_string()));
    }

    let mut stmt = conn
        .prepare(
            "SELECT g.id, g.subject_id, sub.name, g.term, g.score, g.out_of, g.created_at, g.updated_at
             FROM grades g
             JOIN subjects sub ON sub.id = g.subject_id
             WHERE g.student_id = ?
             ORDER BY sub.name, g.term",
        )
        .map_err(ApiError::from)?;
    let rows = stmt
        .query_map([&student_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "subject_id": r.get::<_, String>(1)?,
                "subject": r.get::<_, String>(2)?,
                "term": r.get::<_, Option<String>>(3)?,
                "score": r.get::<_, f64>(4)?,
                "out_of": r.get::<_, f64>(5)?,
                "created_at": r.get::<_, String>(6)?,
                "updated_at": r.get::<_, String>(7)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(ApiError::from)?;
    Ok(Json(json!({ "success": true, "data": rows })))
}

#[derive(Debug, Deserialize)]
pub struct NewGrade {
    pub student_id: String,
    pub subject_id: String,
    #[serde(default)]
    pub term: Option<String>,
    pub score: f64,
    pub out_of: f64,
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<NewGrade>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    if req.out_of <= 0.0 || req.score < 0.0 {
        return Err(ApiError::Validation(
            "score must be >= 0 and out_of must be > 0".to_string(),
        ));
    }

    let conn = state.db()?;
    let student: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [&req.student_id], |r| r.get(0))
        .optional()?;
    if student.is_none() {
        return Err(ApiError::NotFound("student not found".to_string()));
    }
    let subject: Option<i64> = conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [&req.subject_id], |r| r.get(0))
        .optional()?;
    if subject.is_none() {
        return Err(ApiError::NotFound("subject not found".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO grades(id, student_id, subject_id, term, score, out_of, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &req.student_id,
            &req.subject_id,
            &req.term,
            req.score,
            req.out_of,
            &now,
            &now,
        ),
    )?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "id": id,
            "student_id": req.student_id,
            "subject_id": req.subject_id,
            "term": req.term,
            "score": req.score,
            "out_of": req.out_of,
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct GradeUpdate {
    pub term: Option<String>,
    pub score: Option<f64>,
    pub out_of: Option<f64>,
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<GradeUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    let conn = state.db()?;
    let existing = conn
        .query_row(
            "SELECT term, score, out_of FROM grades WHERE id = ?",
            [&id],
            |r| {
                Ok((
                    r.get::<_, Option<String>>(0)?,
                    r.get::<_, f64>(1)?,
                    r.get::<_, f64>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((term, score, out_of)) = existing else {
        return Err(ApiError::NotFound("grade not found".to_string()));
    };

    let score = req.score.unwrap_or(score);
    let out_of = req.out_of.unwrap_or(out_of);
    if out_of <= 0.0 || score < 0.0 {
        return Err(ApiError::Validation(
            "score must be >= 0 and out_of must be > 0".to_string(),
        ));
    }
    conn.execute(
        "UPDATE grades SET term = ?, score = ?, out_of = ?, updated_at = ? WHERE id = ?",
        (
            req.term.or(term),
            score,
            out_of,
            Utc::now().to_rfc3339(),
            &id,
        ),
    )?;
    Ok(Json(json!({
        "success": true,
        "data": { "id": id, "score": score, "out_of": out_of },
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    let conn = state.db()?;
    let changed = conn.execute("DELETE FROM grades WHERE id = ?", [&id])?;
    if changed == 0 {
        return Err(ApiError::NotFound("grade not found".to_string()));
    }
    Ok(Json(json!({ "success": true, "data": { "id": id } })))
}
