use crate::{AppState, handlers::messages};
use axum::{
    Router,
    routing::{get, put},
};

/// Staff Router Module
///
/// The message inbox, open to admins and staff. Wrapped in `verify_token` followed by
/// `require_staff`.
pub fn staff_routes() -> Router<AppState> {
    Router::new()
        // GET /api/messages?status=&search=&page=&limit=
        // `status=all` disables the status filter.
        .route("/api/messages", get(messages::list_messages))
        // GET /api/messages/stats
        .route("/api/messages/stats", get(messages::message_stats))
        // GET /api/messages/{id}
        .route("/api/messages/{id}", get(messages::get_message))
        // PUT /api/messages/{id}/status
        .route(
            "/api/messages/{id}/status",
            put(messages::update_message_status),
        )
}
