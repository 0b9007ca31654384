//! Request handlers, one module per resource.
//!
//! Handlers take the unified `AppState` and return `Result<_, ApiError>`; role checks
//! for whole route groups live in the router layers, not here.

use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, repository::Pagination};

pub mod auth;
pub mod events;
pub mod messages;
pub mod settings;
pub mod users;

/// PageQuery
///
/// `page`/`limit` query parameters. Kept as strings so garbage values fall back to the
/// defaults instead of failing the request.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    pub page: Option<String>,
    /// Page size, clamped to 1..=100 (default 10).
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_query(self.page.as_deref(), self.limit.as_deref())
    }
}

/// Parses a path id, failing with `InvalidId` and the given resource label.
pub(crate) fn parse_id(raw: &str, resource: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::InvalidId(format!("Invalid {resource} ID format")))
}
