use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{
    Event, EventStatus, Message, MessageStatus, NewEvent, NewMessage, Role, Settings,
    SettingsType, UpdateEventRequest, User,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Failures of the persistence layer. Handlers surface all of these as a 500, except
/// `Conflict`, which callers translate into a domain error.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("unique constraint violated: {0}")]
    Conflict(String),
}

// --- Query Types ---

/// Page window for list endpoints. Construction clamps the inputs, so a `Pagination`
/// is always valid: `page >= 1` and `1 <= limit <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Lenient variant for raw query strings: unparsable values fall back to defaults.
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|v| v.trim().parse::<i64>().ok());
        Self::new(parse(page), parse(limit))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Number of pages needed for `total` items: `ceil(total / limit)`.
    pub fn pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

/// Optional filters of GET /api/events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub featured: Option<bool>,
    pub status: Option<EventStatus>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.featured.is_none_or(|f| event.featured == f)
            && self.status.is_none_or(|s| event.status == s)
    }
}

/// Optional filters of GET /api/messages. `search` is a case-insensitive substring
/// matched against name, email, subject and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageFilter {
    pub status: Option<MessageStatus>,
    pub search: Option<String>,
}

impl MessageFilter {
    pub fn matches(&self, message: &Message) -> bool {
        if self.status.is_some_and(|s| message.status != s) {
            return false;
        }
        match &self.search {
            Some(needle) => {
                let needle = needle.to_lowercase();
                [&message.name, &message.email, &message.subject, &message.message]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

/// Field changes for an account. `password_hash` is already hashed.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are
/// interchangeable.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn find_user_by_username(&self, username: &str)
    -> Result<Option<User>, RepositoryError>;
    // Newest first.
    async fn list_users(&self, page: Pagination) -> Result<Vec<User>, RepositoryError>;
    // Counts all users, or only those holding `role`.
    async fn count_users(&self, role: Option<Role>) -> Result<i64, RepositoryError>;
    // Fails with `Conflict` when the username is taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, RepositoryError>;
    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, RepositoryError>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, RepositoryError>;

    // --- Events ---
    // Date ascending, ties broken by id so pages never overlap.
    async fn list_events(
        &self,
        filter: &EventFilter,
        page: Pagination,
    ) -> Result<Vec<Event>, RepositoryError>;
    async fn count_events(&self, filter: &EventFilter) -> Result<i64, RepositoryError>;
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, RepositoryError>;
    async fn create_event(&self, event: NewEvent) -> Result<Event, RepositoryError>;
    // Only supplied fields change.
    async fn update_event(
        &self,
        id: Uuid,
        changes: UpdateEventRequest,
    ) -> Result<Option<Event>, RepositoryError>;
    async fn delete_event(&self, id: Uuid) -> Result<bool, RepositoryError>;

    // --- Messages ---
    // Newest first.
    async fn list_messages(
        &self,
        filter: &MessageFilter,
        page: Pagination,
    ) -> Result<Vec<Message>, RepositoryError>;
    async fn count_messages(&self, filter: &MessageFilter) -> Result<i64, RepositoryError>;
    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, RepositoryError>;
    async fn create_message(&self, message: NewMessage) -> Result<Message, RepositoryError>;
    async fn set_message_status(
        &self,
        id: Uuid,
        status: MessageStatus,
    ) -> Result<Option<Message>, RepositoryError>;
    async fn delete_message(&self, id: Uuid) -> Result<bool, RepositoryError>;
    // One entry per status that has at least one message.
    async fn message_status_counts(&self) -> Result<Vec<(MessageStatus, i64)>, RepositoryError>;

    // --- Settings ---
    async fn get_settings(
        &self,
        settings_type: SettingsType,
    ) -> Result<Option<Settings>, RepositoryError>;
    /// Shallow-merges `patch` into the stored document in one atomic step. A type with
    /// no stored document is seeded from its defaults first.
    async fn merge_settings(
        &self,
        settings_type: SettingsType,
        patch: Map<String, Value>,
        updated_by: Option<Uuid>,
    ) -> Result<Settings, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Top-level key merge: every key of `patch` overwrites the same key of `base`.
pub fn merge_json(base: Value, patch: Map<String, Value>) -> Value {
    let mut merged = match base {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    merged.extend(patch);
    Value::Object(merged)
}
