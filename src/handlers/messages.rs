use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    AppState,
    error::{ApiError, ErrorBody},
    handlers::{PageQuery, parse_id},
    models::{
        ApiResponse, CreateMessageRequest, Message, MessageStats, MessageStatus,
        PaginatedResponse, StatusMessage, UpdateMessageStatusRequest,
    },
    repository::MessageFilter,
};

/// MessageQuery
///
/// Query parameters of GET /api/messages.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct MessageQuery {
    /// A message status, or `all` for no filter.
    pub status: Option<String>,
    /// Case-insensitive substring matched against name, email, subject and body.
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl MessageQuery {
    fn filter(&self) -> Result<MessageFilter, ApiError> {
        let status = match self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "all")
        {
            Some(raw) => Some(
                raw.parse::<MessageStatus>()
                    .map_err(|_| ApiError::InvalidStatus(MessageStatus::allowed()))?,
            ),
            None => None,
        };

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(MessageFilter { status, search })
    }
}

/// submit_message
///
/// [Public Route] Contact-form submission. Stored with status `new`.
#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Stored", body = ApiResponse<Message>),
        (status = 400, description = "Missing name, email or message", body = ErrorBody)
    )
)]
pub async fn submit_message(
    State(state): State<AppState>,
    payload: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Message>>), ApiError> {
    let Json(payload) = payload?;
    let new_message = payload.validate()?;

    let message = state.repo.create_message(new_message).await?;
    tracing::info!(message_id = %message.id, "contact message received");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(message))))
}

/// list_messages
///
/// [Staff Route] Inbox listing, newest first.
#[utoipa::path(
    get,
    path = "/api/messages",
    params(MessageQuery),
    responses(
        (status = 200, description = "One page of messages", body = PaginatedResponse<Message>),
        (status = 400, description = "Unknown status filter", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<PaginatedResponse<Message>>, ApiError> {
    let filter = query.filter()?;
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .pagination();

    let messages = state.repo.list_messages(&filter, page).await?;
    let total = state.repo.count_messages(&filter).await?;

    Ok(Json(PaginatedResponse {
        success: true,
        count: messages.len(),
        total,
        page: page.page,
        pages: page.pages(total),
        data: messages,
    }))
}

/// get_message
///
/// [Staff Route]
#[utoipa::path(
    get,
    path = "/api/messages/{id}",
    params(("id" = String, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<Message>),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Message>>, ApiError> {
    let id = parse_id(&id, "message")?;
    let message = state
        .repo
        .get_message(id)
        .await?
        .ok_or_else(message_not_found)?;

    Ok(Json(ApiResponse::ok(message)))
}

/// update_message_status
///
/// [Staff Route] Moves a message between inbox states. Any state may follow any other.
#[utoipa::path(
    put,
    path = "/api/messages/{id}/status",
    params(("id" = String, Path, description = "Message ID")),
    request_body = UpdateMessageStatusRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<Message>),
        (status = 400, description = "Invalid status", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_message_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateMessageStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Message>>, ApiError> {
    let id = parse_id(&id, "message")?;
    let Json(payload) = payload?;
    let status = payload.parse()?;

    let message = state
        .repo
        .set_message_status(id, status)
        .await?
        .ok_or_else(message_not_found)?;
    tracing::info!(message_id = %message.id, %status, "message status changed");

    Ok(Json(ApiResponse::ok(message)))
}

/// delete_message
///
/// [Admin Route]
#[utoipa::path(
    delete,
    path = "/api/messages/{id}",
    params(("id" = String, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Deleted", body = StatusMessage),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let id = parse_id(&id, "message")?;
    if !state.repo.delete_message(id).await? {
        return Err(message_not_found());
    }
    tracing::info!(message_id = %id, "message deleted");

    Ok(Json(StatusMessage::ok("Message deleted successfully")))
}

/// message_stats
///
/// [Staff Route] Per-status counts for the dashboard.
#[utoipa::path(
    get,
    path = "/api/messages/stats",
    responses((status = 200, description = "Counts", body = ApiResponse<MessageStats>)),
    security(("bearer" = []))
)]
pub async fn message_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MessageStats>>, ApiError> {
    let counts = state.repo.message_status_counts().await?;
    Ok(Json(ApiResponse::ok(MessageStats::from_counts(counts))))
}

fn message_not_found() -> ApiError {
    ApiError::NotFound("Message not found".to_string())
}
