use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Routing split by required access (public, authenticated, staff, admin).
pub mod routes;
use routes::{admin, authenticated, public, staff};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// Extractor-level cap for request bodies. Leaves headroom above the 5 MB image limit
/// so an oversized image still reaches the handler and gets a JSON error.
pub const BODY_LIMIT_BYTES: usize = 6 * 1024 * 1024;

/// Hard cap enforced before any handler runs.
pub const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and schema into the OpenAPI document
/// served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login, handlers::auth::register, handlers::auth::me,
        handlers::events::list_events, handlers::events::get_event,
        handlers::events::create_event, handlers::events::update_event,
        handlers::events::delete_event, handlers::events::upload_event_image,
        handlers::messages::submit_message, handlers::messages::list_messages,
        handlers::messages::get_message, handlers::messages::update_message_status,
        handlers::messages::delete_message, handlers::messages::message_stats,
        handlers::settings::get_all_settings, handlers::settings::get_settings,
        handlers::settings::update_settings,
        handlers::users::list_users, handlers::users::get_user, handlers::users::create_user,
        handlers::users::update_user, handlers::users::delete_user,
        handlers::users::user_stats, handlers::users::change_password,
    ),
    components(
        schemas(
            models::Role, models::EventStatus, models::MessageStatus, models::SettingsType,
            models::UserProfile, models::Event, models::Message, models::Settings,
            models::CreateEventRequest, models::UpdateEventRequest,
            models::CreateMessageRequest, models::UpdateMessageStatusRequest,
            models::LoginRequest, models::CreateUserRequest, models::UpdateUserRequest,
            models::ChangePasswordRequest, models::UpdateSettingsRequest,
            models::MessageStats, models::UserStats, models::UploadedImage,
            models::StatusMessage, models::AuthResponse, models::SettingsResponse,
            error::ErrorBody,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "bridgepoint", description = "BridgePoint Strategies site API")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single shared container for the application's services and configuration.
/// Cloned per request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in deployments, in-memory for tests and database-less runs.
    pub repo: RepositoryState,
    /// Uploaded file storage.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets extractors and middleware pull single components out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the route groups with their access guards, the static upload directory,
/// and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let x_request_id = HeaderName::from_static("x-request-id");
    let uploads = ServeDir::new(&state.config.upload_dir);

    // Layers added later run first: verify_token, then the role check.
    let verified = || middleware::from_fn_with_state(state.clone(), auth::verify_token);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes().route_layer(verified()))
        .merge(
            staff::staff_routes()
                .route_layer(middleware::from_fn(auth::require_staff))
                .route_layer(verified()),
        )
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn(auth::require_admin))
                .route_layer(verified()),
        )
        .nest_service("/uploads", uploads)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
                .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES)),
        )
        .layer(cors)
}

/// CORS with credentials. Origins that are not valid header values are skipped with a
/// warning. A `*` entry echoes the request origin back, since a literal wildcard cannot be
/// combined with credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        tracing::warn!("CORS_ORIGINS contains '*'; every origin is allowed");
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, URI and the `x-request-id`, so every log line of one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
