use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

use super::{
    EventFilter, MessageFilter, Pagination, Repository, RepositoryError, UserChanges, merge_json,
};
use crate::models::{
    Event, Message, MessageStatus, NewEvent, NewMessage, Role, Settings, SettingsType,
    UpdateEventRequest, User,
};

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at";
const EVENT_COLUMNS: &str = "id, title, description, date, location, image_url, featured, \
     registration_link, registration_required, status, created_by, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, name, email, subject, message, status, created_at, updated_at";
const SETTINGS_COLUMNS: &str = "type, data, updated_by, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are built at runtime with bound parameters, never string interpolation
/// of user input.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the schema in `migrations/`.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a unique-constraint violation to `Conflict`, leaving other errors untouched.
fn map_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(what.to_string())
        }
        _ => RepositoryError::Database(err),
    }
}

/// Escapes LIKE metacharacters so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_event_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    if let Some(featured) = filter.featured {
        builder.push(" AND featured = ").push_bind(featured);
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
}

fn push_message_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &MessageFilter) {
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        builder.push(" AND (name ILIKE ").push_bind(pattern.clone());
        builder.push(" OR email ILIKE ").push_bind(pattern.clone());
        builder.push(" OR subject ILIKE ").push_bind(pattern.clone());
        builder.push(" OR message ILIKE ").push_bind(pattern);
        builder.push(")");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, page: Pagination) -> Result<Vec<User>, RepositoryError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn count_users(&self, role: Option<Role>) -> Result<i64, RepositoryError> {
        let count = match role {
            Some(role) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
                    .bind(role)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, password_hash, role, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, username))
    }

    /// update_user
    ///
    /// Uses `COALESCE` so only the supplied fields change.
    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, RepositoryError> {
        let conflict_name = changes.username.clone().unwrap_or_default();
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET username = COALESCE($2, username), \
             password_hash = COALESCE($3, password_hash), role = COALESCE($4, role) \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.password_hash)
        .bind(changes.role)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, &conflict_name))?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- EVENTS ---

    async fn list_events(
        &self,
        filter: &EventFilter,
        page: Pagination,
    ) -> Result<Vec<Event>, RepositoryError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"));
        push_event_filter(&mut builder, filter);
        builder
            .push(" ORDER BY date ASC, id ASC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let events = builder.build_query_as::<Event>().fetch_all(&self.pool).await?;
        Ok(events)
    }

    async fn count_events(&self, filter: &EventFilter) -> Result<i64, RepositoryError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM events WHERE TRUE");
        push_event_filter(&mut builder, filter);
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, RepositoryError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn create_event(&self, event: NewEvent) -> Result<Event, RepositoryError> {
        let created = sqlx::query_as::<_, Event>(&format!(
            "INSERT INTO events (id, title, description, date, location, image_url, featured, \
             registration_link, registration_required, status, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW()) \
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(&event.image_url)
        .bind(event.featured)
        .bind(&event.registration_link)
        .bind(event.registration_required)
        .bind(event.status)
        .bind(event.created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_event(
        &self,
        id: Uuid,
        changes: UpdateEventRequest,
    ) -> Result<Option<Event>, RepositoryError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "UPDATE events SET \
             title = COALESCE($2, title), \
             description = COALESCE($3, description), \
             date = COALESCE($4, date), \
             location = COALESCE($5, location), \
             image_url = COALESCE($6, image_url), \
             featured = COALESCE($7, featured), \
             registration_link = COALESCE($8, registration_link), \
             registration_required = COALESCE($9, registration_required), \
             status = COALESCE($10, status), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.date)
        .bind(changes.location)
        .bind(changes.image_url)
        .bind(changes.featured)
        .bind(changes.registration_link)
        .bind(changes.registration_required)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- MESSAGES ---

    async fn list_messages(
        &self,
        filter: &MessageFilter,
        page: Pagination,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE TRUE"));
        push_message_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC, id ASC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let messages = builder.build_query_as::<Message>().fetch_all(&self.pool).await?;
        Ok(messages)
    }

    async fn count_messages(&self, filter: &MessageFilter) -> Result<i64, RepositoryError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM messages WHERE TRUE");
        push_message_filter(&mut builder, filter);
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, RepositoryError> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let created = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (id, name, email, subject, message, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&message.name)
        .bind(&message.email)
        .bind(&message.subject)
        .bind(&message.message)
        .bind(MessageStatus::New)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn set_message_status(
        &self,
        id: Uuid,
        status: MessageStatus,
    ) -> Result<Option<Message>, RepositoryError> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "UPDATE messages SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn delete_message(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn message_status_counts(&self) -> Result<Vec<(MessageStatus, i64)>, RepositoryError> {
        let counts = sqlx::query_as::<_, (MessageStatus, i64)>(
            "SELECT status, COUNT(*) FROM messages GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    // --- SETTINGS ---

    async fn get_settings(
        &self,
        settings_type: SettingsType,
    ) -> Result<Option<Settings>, RepositoryError> {
        let settings = sqlx::query_as::<_, Settings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM settings WHERE type = $1"
        ))
        .bind(settings_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    /// merge_settings
    ///
    /// A single upsert: the insert branch stores defaults merged with the patch, the
    /// conflict branch applies the patch with JSONB concatenation.
    async fn merge_settings(
        &self,
        settings_type: SettingsType,
        patch: Map<String, Value>,
        updated_by: Option<Uuid>,
    ) -> Result<Settings, RepositoryError> {
        let seeded = merge_json(settings_type.defaults(), patch.clone());

        let settings = sqlx::query_as::<_, Settings>(&format!(
            "INSERT INTO settings (type, data, updated_by, created_at, updated_at) \
             VALUES ($1, $2, $3, NOW(), NOW()) \
             ON CONFLICT (type) DO UPDATE SET \
             data = settings.data || $4, \
             updated_by = COALESCE($3, settings.updated_by), \
             updated_at = NOW() \
             RETURNING {SETTINGS_COLUMNS}"
        ))
        .bind(settings_type)
        .bind(seeded)
        .bind(updated_by)
        .bind(Value::Object(patch))
        .fetch_one(&self.pool)
        .await?;
        Ok(settings)
    }
}
