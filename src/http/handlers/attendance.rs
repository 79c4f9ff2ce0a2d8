use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::attendance::{self, AttendanceItem};
use crate::auth::guards;
use crate::auth::middleware::CurrentUser;
use crate::http::error::ApiError;
use crate::http::AppState;

/// Single object or ordered sequence; bulk is just iteration over the
/// single-item procedure.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RecordBody {
    Many(Vec<AttendanceItem>),
    One(AttendanceItem),
}

pub async fn record(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    let body: RecordBody = serde_json::from_value(body).map_err(|_| {
        ApiError::Validation("body must be an attendance item or an array of items".to_string())
    })?;
    let conn = state.db()?;
    match body {
        RecordBody::One(item) => {
            let outcome = attendance::upsert_one(&conn, &item, Some(&user.id))?;
            Ok(Json(json!({ "success": true, "data": outcome })))
        }
        RecordBody::Many(items) => {
            let report = attendance::record_batch(&conn, &items, Some(&user.id));
            Ok(Json(json!({
                "success": true,
                "results": report.results,
                "summary": report.summary,
            })))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkAllPresentBody {
    pub class_id: Option<String>,
    pub date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn mark_all_present(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<MarkAllPresentBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    let (Some(class_id), Some(date)) = (body.class_id.as_deref(), body.date.as_deref()) else {
        return Err(ApiError::Validation(
            "class_id and date are required".to_string(),
        ));
    };
    let conn = state.db()?;
    let report = attendance::mark_all_present(
        &conn,
        class_id,
        date,
        body.notes.as_deref(),
        Some(&user.id),
    )?;
    Ok(Json(json!({
        "success": true,
        "results": report.results,
        "summary": report.summary,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    let Some(status) = body.status.as_deref() else {
        return Err(ApiError::Validation("status is required".to_string()));
    };
    let conn = state.db()?;
    attendance::update_record(&conn, &id, status, body.notes.as_deref())?;
    Ok(Json(json!({
        "success": true,
        "data": { "id": id, "status": status },
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_teacher_or_admin(&user)?;
    let conn = state.db()?;
    attendance::delete_record(&conn, &id)?;
    Ok(Json(json!({ "success": true, "data": { "id": id } })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub class_id: Option<String>,
    pub date: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(class_id) = q.class_id.as_deref() else {
        return Err(ApiError::Validation("class_id is required".to_string()));
    };
    let conn = state.db()?;
    let rows = attendance::list_records(&conn, class_id, q.date.as_deref())?;
    Ok(Json(json!({ "success": true, "data": rows })))
}
