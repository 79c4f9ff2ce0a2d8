//! Role predicates composed after authentication. Pure checks over the
//! already-loaded identity; no database access. A request that never passed
//! `require_auth` is rejected with 401 by the `CurrentUser` extractor before
//! these run, so the 401/403 split is never conflated.

use super::middleware::CurrentUser;
use super::Role;
use crate::http::error::ApiError;

pub fn require_admin(user: &CurrentUser) -> Result<(), ApiError> {
    match user.role {
        Role::Admin => Ok(()),
        _ => Err(ApiError::Forbidden("admin role required".to_string())),
    }
}

pub fn require_teacher_or_admin(user: &CurrentUser) -> Result<(), ApiError> {
    match user.role {
        Role::Admin | Role::Teacher => Ok(()),
    }
}
