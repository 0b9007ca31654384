use crate::{
    AppState,
    handlers::{auth, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Self-service endpoints for any signed-in account. The router is wrapped in
/// `verify_token`, so every handler here receives a resolved `AuthUser`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/auth/me
        .route("/api/auth/me", get(auth::me))
        // POST /api/users/change-password
        // Requires the current password; works for admins and staff alike.
        .route("/api/users/change-password", post(users::change_password))
}
