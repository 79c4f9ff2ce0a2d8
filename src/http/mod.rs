pub mod error;
pub mod handlers;

use std::sync::{Arc, Mutex, MutexGuard};

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use rusqlite::Connection;

use crate::auth::middleware::{optional_auth, require_auth};
use crate::auth::token::TokenService;
use error::ApiError;

/// Shared per-process state: the single database handle and the token
/// service. No ambient globals; tests build isolated instances.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(conn: Connection, tokens: TokenService) -> AppState {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            tokens: Arc::new(tokens),
        }
    }

    /// Exclusive access to the connection for the duration of one handler's
    /// statements. Serializes writers, which also makes the attendance
    /// check-then-act sequence atomic across requests.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal("database handle poisoned"))
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/password", put(handlers::auth::change_password))
        .route(
            "/api/students",
            get(handlers::students::list).post(handlers::students::create),
        )
        .route(
            "/api/students/{id}",
            get(handlers::students::show)
                .put(handlers::students::update)
                .delete(handlers::students::remove),
        )
        .route(
            "/api/students/{id}/grades",
            get(handlers::grades::list_for_student),
        )
        .route(
            "/api/classes",
            get(handlers::classes::list).post(handlers::classes::create),
        )
        .route("/api/classes/{id}", get(handlers::classes::show))
        .route(
            "/api/subjects",
            get(handlers::grades::list_subjects).post(handlers::grades::create_subject),
        )
        .route("/api/grades", post(handlers::grades::create))
        .route(
            "/api/grades/{id}",
            put(handlers::grades::update).delete(handlers::grades::remove),
        )
        .route(
            "/api/attendance",
            get(handlers::attendance::list).post(handlers::attendance::record),
        )
        .route(
            "/api/attendance/mark-all-present",
            post(handlers::attendance::mark_all_present),
        )
        .route(
            "/api/attendance/{id}",
            put(handlers::attendance::update).delete(handlers::attendance::remove),
        )
        .route("/api/settings", get(handlers::settings::list))
        .route("/api/settings/{key}", put(handlers::settings::set))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let public = Router::new()
        .route("/api/health", get(handlers::core::health))
        .layer(from_fn_with_state(state.clone(), optional_auth))
        .route("/api/auth/login", post(handlers::auth::login));

    Router::new().merge(public).merge(protected).with_state(state)
}
