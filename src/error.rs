//! HTTP-facing error taxonomy.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{auth::password::PasswordError, repository::RepositoryError, storage::StorageError};

/// Every failure a handler can surface to a client.
///
/// Lower layers convert into `Repository`/`Storage`/`Password`, which all render as a
/// generic 500 so persistence details never reach the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidId(String),

    #[error("Please provide a valid status ({0})")]
    InvalidStatus(String),

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("{0}")]
    LastAdminProtection(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Token expired.")]
    TokenExpired,

    #[error("Access denied. Insufficient permissions.")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("Server error")]
    Server(String),

    #[error("Server error")]
    Repository(#[from] RepositoryError),

    #[error("Server error")]
    Storage(#[from] StorageError),

    #[error("Server error")]
    Password(#[from] PasswordError),
}

/// Body of every failed request: `{success:false, message, error?}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Controls whether 500 responses carry the underlying error text.
/// Set once at startup from the runtime environment.
static EXPOSE_DETAILS: std::sync::OnceLock<bool> = std::sync::OnceLock::new();

pub fn expose_error_details(expose: bool) {
    let _ = EXPOSE_DETAILS.set(expose);
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidId(_)
            | Self::InvalidStatus(_)
            | Self::DuplicateUsername
            | Self::WrongPassword
            | Self::LastAdminProtection(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthorized(_) | Self::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Server(_) | Self::Repository(_) | Self::Storage(_) | Self::Password(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            Self::Server(detail) => Some(detail.clone()),
            Self::Repository(e) => Some(e.to_string()),
            Self::Storage(e) => Some(e.to_string()),
            Self::Password(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error = if status.is_server_error() {
            tracing::error!(error = ?self, detail = ?self.detail(), "request failed");
            self.detail()
                .filter(|_| *EXPOSE_DETAILS.get().unwrap_or(&true))
        } else {
            None
        };

        let body = ErrorBody {
            success: false,
            message: self.to_string(),
            error,
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}
