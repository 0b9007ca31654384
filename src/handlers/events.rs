use axum::{
    Json,
    extract::{Multipart, Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ErrorBody},
    handlers::{PageQuery, parse_id},
    models::{
        ApiResponse, CreateEventRequest, Event, EventStatus, PaginatedResponse, StatusMessage,
        UpdateEventRequest, UploadedImage,
    },
    repository::EventFilter,
    storage,
};

/// EventQuery
///
/// Query parameters of GET /api/events.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct EventQuery {
    /// `true` restricts to featured events; any other value to non-featured ones.
    pub featured: Option<String>,
    /// One of upcoming, ongoing, completed, cancelled.
    pub status: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl EventQuery {
    fn filter(&self) -> Result<EventFilter, ApiError> {
        let featured = self
            .featured
            .as_deref()
            .filter(|f| !f.is_empty())
            .map(|f| f == "true");

        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<EventStatus>().map_err(|_| {
                ApiError::Validation(format!(
                    "Invalid event status ({})",
                    EventStatus::allowed()
                ))
            })?),
            None => None,
        };

        Ok(EventFilter { featured, status })
    }

    fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page.clone(),
            limit: self.limit.clone(),
        }
    }
}

/// list_events
///
/// [Public Route] Events sorted by date ascending, filtered and paginated.
#[utoipa::path(
    get,
    path = "/api/events",
    params(EventQuery),
    responses((status = 200, description = "One page of events", body = PaginatedResponse<Event>))
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Result<Json<PaginatedResponse<Event>>, ApiError> {
    let filter = query.filter()?;
    let page = query.page().pagination();

    let events = state.repo.list_events(&filter, page).await?;
    let total = state.repo.count_events(&filter).await?;
    tracing::debug!(?filter, page = page.page, limit = page.limit, total, "listed events");

    Ok(Json(PaginatedResponse {
        success: true,
        count: events.len(),
        total,
        page: page.page,
        pages: page.pages(total),
        data: events,
    }))
}

/// get_event
///
/// [Public Route] A single event by id.
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<Event>),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let id = parse_id(&id, "event")?;
    let event = state
        .repo
        .get_event(id)
        .await?
        .ok_or_else(event_not_found)?;

    Ok(Json(ApiResponse::ok(event)))
}

/// create_event
///
/// [Admin Route] Creates an event owned by the caller. A missing image falls back to
/// the placeholder.
#[utoipa::path(
    post,
    path = "/api/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<Event>),
        (status = 400, description = "Validation failed", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn create_event(
    caller: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Event>>), ApiError> {
    let Json(payload) = payload?;
    let new_event = payload.validate(caller.id)?;

    let event = state.repo.create_event(new_event).await?;
    tracing::info!(event_id = %event.id, created_by = %caller.id, "event created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(event))))
}

/// update_event
///
/// [Admin Route] Partial update; only supplied fields change.
#[utoipa::path(
    put,
    path = "/api/events/{id}",
    params(("id" = String, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Event>),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateEventRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Event>>, ApiError> {
    let id = parse_id(&id, "event")?;
    let Json(payload) = payload?;
    let changes = payload.validate()?;

    let event = state
        .repo
        .update_event(id, changes)
        .await?
        .ok_or_else(event_not_found)?;
    tracing::info!(event_id = %event.id, "event updated");

    Ok(Json(ApiResponse::ok(event)))
}

/// delete_event
///
/// [Admin Route] Hard delete.
#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    params(("id" = String, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Deleted", body = StatusMessage),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let id = parse_id(&id, "event")?;
    if !state.repo.delete_event(id).await? {
        return Err(event_not_found());
    }
    tracing::info!(event_id = %id, "event deleted");

    Ok(Json(StatusMessage::ok("Event deleted successfully")))
}

/// upload_event_image
///
/// [Admin Route] Accepts a multipart form with an `image` field, checks type and size,
/// and stores it as `events/event_<millis>.<ext>`. The returned `filePath` is what the
/// client puts into an event's `imageUrl`.
#[utoipa::path(
    post,
    path = "/api/events/upload",
    request_body(content_type = "multipart/form-data", description = "Form with an `image` file field"),
    responses(
        (status = 200, description = "Stored", body = ApiResponse<UploadedImage>),
        (status = 400, description = "Missing, oversized or non-image file", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn upload_event_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadedImage>>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let extension = storage::validate_image(content_type.as_deref(), bytes.len())
            .map_err(ApiError::Validation)?;
        let (key, file_path) = storage::save_event_image(
            state.storage.as_ref(),
            original_name.as_deref(),
            extension,
            &bytes,
            Utc::now().timestamp_millis(),
        )
        .await?;
        let file_name = key.rsplit('/').next().unwrap_or(&key).to_string();
        tracing::info!(file = %file_name, size = bytes.len(), "event image uploaded");

        return Ok(Json(ApiResponse::ok(UploadedImage {
            file_name,
            file_path,
        })));
    }

    Err(ApiError::Validation("Please upload an image".to_string()))
}

fn event_not_found() -> ApiError {
    ApiError::NotFound("Event not found".to_string())
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::Validation("Image must be 5MB or smaller".to_string())
    } else {
        ApiError::Validation(err.body_text())
    }
}
