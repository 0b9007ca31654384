use crate::{
    AppState,
    handlers::{auth, events, messages, settings},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token: the public site's reads, the contact form and
/// login. `GET /api/settings/{type}` is mounted here but checks admin access itself
/// for non-general types.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/login
        .route("/api/auth/login", post(auth::login))
        // GET /api/events?featured=&status=&page=&limit=
        .route("/api/events", get(events::list_events))
        // GET /api/events/{id}
        .route("/api/events/{id}", get(events::get_event))
        // POST /api/messages
        // Contact form.
        .route("/api/messages", post(messages::submit_message))
        // GET /api/settings
        // Admin tokens see every type; everyone else only `general`.
        .route("/api/settings", get(settings::get_all_settings))
        // GET /api/settings/{type}
        .route("/api/settings/{type}", get(settings::get_settings))
}
