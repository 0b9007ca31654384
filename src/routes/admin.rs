use crate::{
    AppState,
    handlers::{auth, events, messages, settings, users},
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Content management and account administration. The whole router sits behind
/// `verify_token` and `require_admin`, so handlers do not repeat the role check.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /api/auth/register
        // Creates an account and returns a token for it.
        .route("/api/auth/register", post(auth::register))
        // --- Events ---
        .route("/api/events", post(events::create_event))
        .route(
            "/api/events/{id}",
            put(events::update_event).delete(events::delete_event),
        )
        // POST /api/events/upload
        // Multipart form, field `image`, at most 5 MB.
        .route("/api/events/upload", post(events::upload_event_image))
        // --- Messages ---
        .route("/api/messages/{id}", delete(messages::delete_message))
        // --- Settings ---
        // PUT /api/settings/{type}
        // Writes to every type, `general` included, require an admin.
        .route("/api/settings/{type}", put(settings::update_settings))
        // --- Users ---
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/stats", get(users::user_stats))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
}
