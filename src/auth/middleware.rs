use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use rusqlite::OptionalExtension;
use serde::Serialize;

use super::token::TokenError;
use super::Role;
use crate::http::error::ApiError;
use crate::http::AppState;

/// Identity attached to the request by `require_auth`/`optional_auth`.
/// Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub display_name: String,
}

/// Middleware: require a valid bearer token and a live user row behind it.
/// On success the loaded `CurrentUser` is inserted into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state, req.headers())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Weaker variant: any authentication failure is swallowed and the request
/// proceeds without an identity attached.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Ok(user) = authenticate(&state, req.headers()) {
        req.extensions_mut().insert(user);
    }
    next.run(req).await
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, ApiError> {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated("missing credentials".to_string()))?;
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthenticated("malformed authorization header".to_string()))?;

    let claims = state.tokens.verify(token).map_err(|e| match e {
        TokenError::Expired => {
            ApiError::Unauthenticated("token expired, please log in again".to_string())
        }
        TokenError::Invalid => ApiError::Unauthenticated("invalid token".to_string()),
    })?;

    let conn = state.db()?;
    let row = conn
        .query_row(
            "SELECT id, username, email, role, display_name FROM users WHERE id = ?",
            [&claims.sub],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                ))
            },
        )
        .optional()
        .map_err(|e| ApiError::Internal(e.into()))?;
    let Some((id, username, email, role, display_name)) = row else {
        return Err(ApiError::Unauthenticated(
            "user not found for token".to_string(),
        ));
    };
    let role = Role::parse(&role)
        .ok_or_else(|| ApiError::internal(format!("user {id} has unknown role {role}")))?;

    Ok(CurrentUser {
        id,
        username,
        email,
        role,
        display_name,
    })
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthenticated("authentication required".to_string()))
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned())
    }
}
