use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::{AuthUser, password},
    error::{ApiError, ErrorBody},
    handlers::{PageQuery, auth::duplicate_username, parse_id},
    models::{
        ApiResponse, ChangePasswordRequest, CreateUserRequest, PaginatedResponse, Role,
        StatusMessage, UpdateUserRequest, User, UserProfile, UserStats,
    },
    repository::{RepositoryState, UserChanges},
};

/// list_users
///
/// [Admin Route] Accounts, newest first. Password hashes never leave the store layer.
#[utoipa::path(
    get,
    path = "/api/users",
    params(PageQuery),
    responses((status = 200, description = "One page of users", body = PaginatedResponse<UserProfile>)),
    security(("bearer" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<UserProfile>>, ApiError> {
    let page = query.pagination();
    let users = state.repo.list_users(page).await?;
    let total = state.repo.count_users(None).await?;

    Ok(Json(PaginatedResponse {
        success: true,
        count: users.len(),
        total,
        page: page.page,
        pages: page.pages(total),
        data: users.into_iter().map(UserProfile::from).collect(),
    }))
}

/// get_user
///
/// [Admin Route]
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = ApiResponse<UserProfile>),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let user = find_user(&state.repo, &id).await?;
    Ok(Json(ApiResponse::ok(user.into())))
}

/// create_user
///
/// [Admin Route] Same rules as registration, without issuing a token.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = ApiResponse<UserProfile>),
        (status = 400, description = "Missing fields or duplicate username", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), ApiError> {
    let Json(payload) = payload?;
    let new_user = payload.validate()?;

    let hash = password::hash_password(&new_user.password)?;
    let user = state
        .repo
        .create_user(&new_user.username, &hash, new_user.role)
        .await
        .map_err(duplicate_username)?;
    tracing::info!(user_id = %user.id, role = %user.role, "user created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(user.into()))))
}

/// update_user
///
/// [Admin Route] Partial update. A new password is re-hashed; demoting the only
/// remaining admin is refused.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = ApiResponse<UserProfile>),
        (status = 400, description = "Duplicate username or last admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let Json(payload) = payload?;
    let user = find_user(&state.repo, &id).await?;

    if user.role == Role::Admin && payload.role == Some(Role::Staff) {
        ensure_not_last_admin(&state.repo, "Cannot demote the last admin user").await?;
    }

    let password_hash = match payload.password.filter(|p| !p.is_empty()) {
        Some(plain) => Some(password::hash_password(&plain)?),
        None => None,
    };
    let changes = UserChanges {
        username: payload
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty()),
        password_hash,
        role: payload.role,
    };

    let updated = state
        .repo
        .update_user(user.id, changes)
        .await
        .map_err(duplicate_username)?
        .ok_or_else(user_not_found)?;
    tracing::info!(user_id = %updated.id, role = %updated.role, "user updated");

    Ok(Json(ApiResponse::ok(updated.into())))
}

/// delete_user
///
/// [Admin Route] Refuses to remove the only remaining admin.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Deleted", body = StatusMessage),
        (status = 400, description = "Last admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let user = find_user(&state.repo, &id).await?;

    if user.role == Role::Admin {
        ensure_not_last_admin(&state.repo, "Cannot delete the last admin user").await?;
    }

    if !state.repo.delete_user(user.id).await? {
        return Err(user_not_found());
    }
    tracing::info!(user_id = %user.id, "user deleted");

    Ok(Json(StatusMessage::ok("User deleted successfully")))
}

/// user_stats
///
/// [Admin Route] Account counts by role.
#[utoipa::path(
    get,
    path = "/api/users/stats",
    responses((status = 200, description = "Counts", body = ApiResponse<UserStats>)),
    security(("bearer" = []))
)]
pub async fn user_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserStats>>, ApiError> {
    let stats = UserStats {
        total: state.repo.count_users(None).await?,
        admins: state.repo.count_users(Some(Role::Admin)).await?,
        staff: state.repo.count_users(Some(Role::Staff)).await?,
    };
    Ok(Json(ApiResponse::ok(stats)))
}

/// change_password
///
/// [Authenticated Route] The caller replaces their own password after proving the
/// current one.
#[utoipa::path(
    post,
    path = "/api/users/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Changed", body = StatusMessage),
        (status = 400, description = "Current password is incorrect", body = ErrorBody)
    ),
    security(("bearer" = []))
)]
pub async fn change_password(
    caller: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<StatusMessage>, ApiError> {
    let Json(payload) = payload?;
    let (Some(current), Some(new)) = (
        payload.current_password,
        payload.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::Validation(
            "Please provide current and new password".to_string(),
        ));
    };

    let user = state
        .repo
        .find_user_by_id(caller.id)
        .await?
        .ok_or_else(user_not_found)?;

    if !password::verify_password(&current, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "password change rejected");
        return Err(ApiError::WrongPassword);
    }

    let changes = UserChanges {
        password_hash: Some(password::hash_password(&new)?),
        ..UserChanges::default()
    };
    state
        .repo
        .update_user(user.id, changes)
        .await?
        .ok_or_else(user_not_found)?;
    tracing::info!(user_id = %user.id, "password changed");

    Ok(Json(StatusMessage::ok("Password updated successfully")))
}

async fn find_user(repo: &RepositoryState, raw_id: &str) -> Result<User, ApiError> {
    let id = parse_id(raw_id, "user")?;
    repo.find_user_by_id(id).await?.ok_or_else(user_not_found)
}

async fn ensure_not_last_admin(repo: &RepositoryState, message: &str) -> Result<(), ApiError> {
    if repo.count_users(Some(Role::Admin)).await? <= 1 {
        return Err(ApiError::LastAdminProtection(message.to_string()));
    }
    Ok(())
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}
