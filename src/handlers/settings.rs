use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde_json::{Map, Value};

use crate::{
    AppState,
    auth::{self, ADMIN_ONLY, AuthUser},
    error::{ApiError, ErrorBody},
    models::{Role, SettingsResponse, SettingsType, UpdateSettingsRequest},
    repository::RepositoryState,
};

/// get_all_settings
///
/// [Public Route] `{general}` for anonymous and non-admin callers; every type for
/// admins. A missing, invalid or expired token is treated as anonymous here; store
/// failures while resolving the caller still surface as a 500.
#[utoipa::path(
    get,
    path = "/api/settings",
    responses((status = 200, description = "Settings keyed by type", body = SettingsResponse))
)]
pub async fn get_all_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SettingsResponse>, ApiError> {
    let is_admin = match auth::bearer_token(&headers) {
        Some(_) => match auth::authenticate(&headers, &state.repo, &state.config).await {
            Ok(user) => user.role == Role::Admin,
            Err(ApiError::Unauthorized(_) | ApiError::TokenExpired) => false,
            Err(e) => return Err(e),
        },
        None => false,
    };

    let visible: &[SettingsType] = if is_admin {
        SettingsType::ALL
    } else {
        &[SettingsType::General]
    };

    let mut all = Map::new();
    for settings_type in visible {
        let data = settings_data(&state.repo, *settings_type).await?;
        all.insert(settings_type.as_str().to_string(), data);
    }

    Ok(Json(SettingsResponse {
        success: true,
        data: Value::Object(all),
    }))
}

/// get_settings
///
/// [Public Route for `general`] Other types require an admin token, checked here
/// because the route itself is public.
#[utoipa::path(
    get,
    path = "/api/settings/{type}",
    params(("type" = String, Path, description = "general, notifications or security")),
    responses(
        (status = 200, description = "Settings document", body = SettingsResponse),
        (status = 400, description = "Unknown type", body = ErrorBody),
        (status = 401, description = "Token required for non-public types", body = ErrorBody),
        (status = 403, description = "Admin only", body = ErrorBody)
    )
)]
pub async fn get_settings(
    State(state): State<AppState>,
    Path(settings_type): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings_type = parse_type(&settings_type)?;

    if !settings_type.is_public() {
        let caller = auth::authenticate(&headers, &state.repo, &state.config).await?;
        caller.require(ADMIN_ONLY)?;
    }

    Ok(Json(SettingsResponse {
        success: true,
        data: settings_data(&state.repo, settings_type).await?,
    }))
}

/// update_settings
///
/// [Admin Route] Merges `data` key-by-key into the stored document, seeding it from the
/// defaults when the type was never saved.
#[utoipa::path(
    put,
    path = "/api/settings/{type}",
    params(("type" = String, Path, description = "general, notifications or security")),
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Merged document", body = SettingsResponse),
        (status = 400, description = "Unknown type or non-object data", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_settings(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(settings_type): Path<String>,
    payload: Result<Json<UpdateSettingsRequest>, JsonRejection>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings_type = parse_type(&settings_type)?;
    let Json(payload) = payload?;
    let patch = payload.into_patch()?;

    let settings = state
        .repo
        .merge_settings(settings_type, patch, Some(caller.id))
        .await?;
    tracing::info!(settings_type = %settings_type, updated_by = %caller.id, "settings updated");

    Ok(Json(SettingsResponse {
        success: true,
        data: settings.data,
    }))
}

fn parse_type(raw: &str) -> Result<SettingsType, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation("Invalid settings type".to_string()))
}

/// Stored document for `settings_type`, or its defaults when none was saved yet.
async fn settings_data(
    repo: &RepositoryState,
    settings_type: SettingsType,
) -> Result<Value, ApiError> {
    Ok(repo
        .get_settings(settings_type)
        .await?
        .map(|settings| settings.data)
        .unwrap_or_else(|| settings_type.defaults()))
}
