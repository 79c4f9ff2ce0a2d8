use axum::Json;
use serde_json::json;

use crate::auth::middleware::CurrentUser;

/// Unauthenticated liveness probe. Output is personalized when a valid token
/// accompanies the request, which is the only caller of the optional-auth
/// policy.
pub async fn health(user: Option<CurrentUser>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "data": {
            "version": env!("CARGO_PKG_VERSION"),
            "authenticated_as": user.map(|u| u.username),
        }
    }))
}
