use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

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
        .prepare("SELECT key, value FROM settings ORDER BY key")
        .map_err(ApiError::from)?;
    let pairs = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(ApiError::from)?;

    let mut data = serde_json::Map::new();
    for (key, value) in pairs {
        data.insert(key, json!(value));
    }
    Ok(Json(json!({ "success": true, "data": data })))
}

#[derive(Debug, Deserialize)]
pub struct SettingBody {
    pub value: String,
}

pub async fn set(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(key): Path<String>,
    Json(req): Json<SettingBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_admin(&user)?;
    if key.trim().is_empty() {
        return Err(ApiError::Validation("key is required".to_string()));
    }
    let conn = state.db()?;
    conn.execute(
        "INSERT INTO settings(key, value, updated_at)
         VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET
           value = excluded.value,
           updated_at = excluded.updated_at",
        (&key, &req.value, Utc::now().to_rfc3339()),
    )?;
    Ok(Json(json!({
        "success": true,
        "data": { "key": key, "value": req.value },
    })))
}
