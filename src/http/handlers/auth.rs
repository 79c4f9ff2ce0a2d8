use axum::extract::State;
use axum::Json;
use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::middleware::CurrentUser;
use crate::auth::token::login_ttl;
use crate::auth::{guards, password, Role};
use crate::http::error::ApiError;
use crate::http::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let (id, username, email, password_hash, role, display_name) = {
        let conn = state.db()?;
        let row = conn
            .query_row(
                "SELECT id, username, email, password_hash, role, display_name
                 FROM users WHERE username = ?",
                [&req.username],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some(row) => row,
            None => {
                return Err(ApiError::Unauthenticated(
                    "invalid username or password".to_string(),
                ))
            }
        }
    };

    if !password::verify(&req.password, &password_hash) {
        return Err(ApiError::Unauthenticated(
            "invalid username or password".to_string(),
        ));
    }
    let role = Role::parse(&role)
        .ok_or_else(|| ApiError::internal(format!("user {id} has unknown role {role}")))?;
    let token = state.tokens.issue(&id, &username, role, login_ttl())?;

    tracing::info!(user = %username, "login");
    Ok(Json(json!({
        "success": true,
        "data": {
            "user": {
                "id": id,
                "username": username,
                "email": email,
                "role": role.as_str(),
                "display_name": display_name,
            },
            "token": token,
        }
    })))
}

pub async fn me(user: CurrentUser) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": user }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Admin-only user creation; there is no self-service signup.
pub async fn register(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    guards::require_admin(&user)?;

    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "username, email and password are required".to_string(),
        ));
    }
    let role = Role::parse(&req.role)
        .ok_or_else(|| ApiError::Validation("role must be admin or teacher".to_string()))?;

    let conn = state.db()?;
    let taken: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM users WHERE username = ? OR email = ? LIMIT 1",
            (&req.username, &req.email),
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(ApiError::Duplicate(
            "user with this username or email already exists".to_string(),
        ));
    }

    let id = Uuid::new_v4().to_string();
    let display_name = req
        .display_name
        .clone()
        .unwrap_or_else(|| req.username.clone());
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO users(id, username, email, password_hash, role, display_name, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            &req.username,
            &req.email,
            password::hash(&req.password)?,
            role.as_str(),
            &display_name,
            &now,
            &now,
        ),
    )?;

    tracing::info!(user = %req.username, role = role.as_str(), "user registered");
    Ok(Json(json!({
        "success": true,
        "data": {
            "id": id,
            "username": req.username,
            "email": req.email,
            "role": role.as_str(),
            "display_name": display_name,
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.new_password.is_empty() {
        return Err(ApiError::Validation(
            "new password must not be empty".to_string(),
        ));
    }

    let conn = state.db()?;
    let stored: String = conn.query_row(
        "SELECT password_hash FROM users WHERE id = ?",
        [&user.id],
        |r| r.get(0),
    )?;
    if !password::verify(&req.current_password, &stored) {
        return Err(ApiError::Forbidden(
            "current password does not match".to_string(),
        ));
    }

    conn.execute(
        "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?",
        (
            password::hash(&req.new_password)?,
            Utc::now().to_rfc3339(),
            &user.id,
        ),
    )?;
    Ok(Json(json!({
        "success": true,
        "data": { "id": user.id },
        "message": "password changed",
    })))
}
