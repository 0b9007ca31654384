use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value, json};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;

/// Image used for events created without an uploaded flyer.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400?text=Event+Image";

pub const EVENT_TITLE_MAX_LEN: usize = 100;

// --- Enumerations ---

/// Declares a lowercase string enum with `as_str`, `FromStr`, `Display` and the list of
/// accepted values. Stored in Postgres as `TEXT`.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema,
            sqlx::Type,
        )]
        #[serde(rename_all = "lowercase")]
        #[sqlx(type_name = "text", rename_all = "lowercase")]
        #[ts(export)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Comma-separated accepted values, used in error messages.
            pub fn allowed() -> String {
                Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Role
    ///
    /// The RBAC field. Admins have full access; staff can read and triage messages.
    #[derive(Default)]
    Role {
        Admin => "admin",
        #[default]
        Staff => "staff",
    }
);

string_enum!(
    /// Lifecycle of an event as shown on the public calendar.
    #[derive(Default)]
    EventStatus {
        #[default]
        Upcoming => "upcoming",
        Ongoing => "ongoing",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

string_enum!(
    /// Inbox state of a contact-form message.
    #[derive(Default)]
    MessageStatus {
        #[default]
        New => "new",
        Read => "read",
        Replied => "replied",
        Archived => "archived",
    }
);

string_enum!(
    /// The three settings documents. One row exists per type at most.
    SettingsType {
        General => "general",
        Notifications => "notifications",
        Security => "security",
    }
);

impl SettingsType {
    /// Values served for a type that has never been saved.
    pub fn defaults(&self) -> Value {
        match self {
            SettingsType::General => json!({
                "siteName": "BridgePoint Strategies",
                "siteDescription": "Creating powerful connections between organizations, communities, and cultures to drive meaningful change and sustainable growth across borders.",
                "contactEmail": "info@bridgepoint-strategies.com",
                "contactPhone": "(123) 456-7890",
                "address": "Washington D.C."
            }),
            SettingsType::Notifications => json!({
                "emailNotifications": true,
                "messageAlerts": true,
                "eventReminders": true,
                "systemUpdates": false
            }),
            SettingsType::Security => json!({
                "requireStrongPasswords": true,
                "sessionTimeout": "30",
                "twoFactorAuth": false
            }),
        }
    }

    /// Only general settings are readable without an admin session.
    pub fn is_public(&self) -> bool {
        matches!(self, SettingsType::General)
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Account record as stored. Carries the password hash, so it is never serialized;
/// responses go through `UserProfile`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// Public view of a user, safe to return from any endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Event
///
/// A calendar entry shown on the public site and managed from the admin panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
    pub location: String,
    pub image_url: String,
    pub featured: bool,
    pub registration_link: Option<String>,
    pub registration_required: bool,
    pub status: EventStatus,
    // FK to users.id. Stored reference only.
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Message
///
/// A contact-form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Message {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub status: MessageStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Settings
///
/// One free-form document per `SettingsType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Settings {
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub settings_type: SettingsType,
    #[schema(value_type = Object)]
    #[ts(type = "Record<string, unknown>")]
    pub data: Value,
    pub updated_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// CreateEventRequest
///
/// Input payload for POST /api/events. Required fields are `Option` so a missing one
/// produces a readable validation message instead of a deserializer error.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "event_date")]
    #[ts(type = "string | null")]
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub featured: Option<bool>,
    pub registration_link: Option<String>,
    pub registration_required: Option<bool>,
    pub status: Option<EventStatus>,
}

/// A validated event, ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub image_url: String,
    pub featured: bool,
    pub registration_link: Option<String>,
    pub registration_required: bool,
    pub status: EventStatus,
    pub created_by: Uuid,
}

impl CreateEventRequest {
    pub fn validate(self, created_by: Uuid) -> Result<NewEvent, ApiError> {
        let title = required(self.title, "Event title is required")?;
        check_title(&title)?;

        Ok(NewEvent {
            title,
            description: required(self.description, "Event description is required")?,
            date: self
                .date
                .ok_or_else(|| ApiError::Validation("Event date is required".to_string()))?,
            location: required(self.location, "Event location is required")?,
            image_url: trimmed(self.image_url)
                .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string()),
            featured: self.featured.unwrap_or(false),
            registration_link: trimmed(self.registration_link),
            registration_required: self.registration_required.unwrap_or(false),
            status: self.status.unwrap_or_default(),
            created_by,
        })
    }
}

/// UpdateEventRequest
///
/// Partial update payload for PUT /api/events/{id}. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "event_date"
    )]
    #[ts(type = "string | null")]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
}

impl UpdateEventRequest {
    /// Applies the create-time field rules to every supplied field and trims strings.
    pub fn validate(self) -> Result<Self, ApiError> {
        let title = match self.title {
            Some(title) => {
                let title = required(Some(title), "Event title is required")?;
                check_title(&title)?;
                Some(title)
            }
            None => None,
        };
        let description = self
            .description
            .map(|d| required(Some(d), "Event description is required"))
            .transpose()?;
        let location = self
            .location
            .map(|l| required(Some(l), "Event location is required"))
            .transpose()?;
        let image_url = self
            .image_url
            .map(|i| required(Some(i), "Event image is required"))
            .transpose()?;

        Ok(Self {
            title,
            description,
            location,
            image_url,
            registration_link: self.registration_link.map(|l| l.trim().to_string()),
            ..self
        })
    }

    /// Applies the supplied fields onto an existing event.
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(description) = &self.description {
            event.description = description.clone();
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(location) = &self.location {
            event.location = location.clone();
        }
        if let Some(image_url) = &self.image_url {
            event.image_url = image_url.clone();
        }
        if let Some(featured) = self.featured {
            event.featured = featured;
        }
        if let Some(link) = &self.registration_link {
            event.registration_link = Some(link.clone());
        }
        if let Some(required) = self.registration_required {
            event.registration_required = required;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
    }
}

/// CreateMessageRequest
///
/// Contact-form submission (POST /api/messages).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateMessageRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// A validated contact-form submission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl CreateMessageRequest {
    pub fn validate(self) -> Result<NewMessage, ApiError> {
        const MISSING: &str = "Please provide name, email, and message";

        let name = trimmed(self.name);
        let email = trimmed(self.email).map(|e| e.to_lowercase());
        let message = trimmed(self.message);

        match (name, email, message) {
            (Some(name), Some(email), Some(message)) => Ok(NewMessage {
                name,
                email,
                subject: trimmed(self.subject).unwrap_or_default(),
                message,
            }),
            _ => Err(ApiError::Validation(MISSING.to_string())),
        }
    }
}

/// UpdateMessageStatusRequest
///
/// Body of PUT /api/messages/{id}/status. Parsed by hand so an unknown value maps to
/// `InvalidStatus` rather than a generic deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateMessageStatusRequest {
    pub status: Option<String>,
}

impl UpdateMessageStatusRequest {
    pub fn parse(&self) -> Result<MessageStatus, ApiError> {
        self.status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ApiError::InvalidStatus(MessageStatus::allowed()))
    }
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// CreateUserRequest
///
/// Used by both POST /api/auth/register and POST /api/users. Role defaults to staff.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// Validated input for a new account. The password is still plaintext here.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl CreateUserRequest {
    pub fn validate(self) -> Result<NewUser, ApiError> {
        match (trimmed(self.username), non_empty(self.password)) {
            (Some(username), Some(password)) => Ok(NewUser {
                username,
                password,
                role: self.role.unwrap_or_default(),
            }),
            _ => Err(ApiError::Validation(
                "Please provide username and password".to_string(),
            )),
        }
    }
}

/// UpdateUserRequest
///
/// Partial update for PUT /api/users/{id}. A supplied password is re-hashed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// ChangePasswordRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// UpdateSettingsRequest
///
/// `data` is merged key-by-key into the stored document.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateSettingsRequest {
    #[schema(value_type = Option<Object>)]
    #[ts(type = "Record<string, unknown> | null")]
    pub data: Option<Value>,
}

impl UpdateSettingsRequest {
    pub fn into_patch(self) -> Result<Map<String, Value>, ApiError> {
        match self.data {
            Some(Value::Object(map)) => Ok(map),
            _ => Err(ApiError::Validation("Invalid settings data".to_string())),
        }
    }
}

// --- Dashboard Schemas (Output) ---

/// MessageStats
///
/// Per-status message counts for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageStats {
    pub total: i64,
    pub new: i64,
    pub read: i64,
    pub replied: i64,
    pub archived: i64,
}

impl MessageStats {
    /// Builds the stats from `(status, count)` pairs as returned by a group-by.
    pub fn from_counts(counts: impl IntoIterator<Item = (MessageStatus, i64)>) -> Self {
        let mut stats = Self::default();
        for (status, count) in counts {
            match status {
                MessageStatus::New => stats.new += count,
                MessageStatus::Read => stats.read += count,
                MessageStatus::Replied => stats.replied += count,
                MessageStatus::Archived => stats.archived += count,
            }
            stats.total += count;
        }
        stats
    }
}

/// UserStats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserStats {
    pub total: i64,
    pub admins: i64,
    pub staff: i64,
}

/// UploadedImage
///
/// Result of POST /api/events/upload. `filePath` is stored into an event's `imageUrl`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UploadedImage {
    pub file_name: String,
    pub file_path: String,
}

// --- Response Envelopes ---

/// `{success: true, data}` wrapper used by single-resource endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

/// Paginated list envelope: `{success, count, total, page, pages, data}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub data: Vec<T>,
}

/// `{success, message}` reply for operations with nothing to return.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusMessage {
    pub success: bool,
    pub message: String,
}

impl StatusMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Reply to a successful login or registration.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserProfile,
}

/// Settings payload envelope. `data` is the bare settings object.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub data: Value,
}

// --- Field helpers ---

/// Parses an event date. Accepts RFC 3339, a `datetime-local` value (read as UTC) or a
/// bare `YYYY-MM-DD`, which maps to midnight UTC.
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `deserialize_with` hook for event dates. A blank string counts as absent.
fn event_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_event_date(raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid event date '{raw}'"))),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    trimmed(value).ok_or_else(|| ApiError::Validation(message.to_string()))
}

fn check_title(title: &str) -> Result<(), ApiError> {
    if title.chars().count() > EVENT_TITLE_MAX_LEN {
        return Err(ApiError::Validation(format!(
            "Title cannot be more than {EVENT_TITLE_MAX_LEN} characters"
        )));
    }
    Ok(())
}
