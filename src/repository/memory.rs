use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{
    EventFilter, MessageFilter, Pagination, Repository, RepositoryError, UserChanges, merge_json,
};
use crate::models::{
    Event, Message, MessageStatus, NewEvent, NewMessage, Role, Settings, SettingsType,
    UpdateEventRequest, User,
};

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    messages: HashMap<Uuid, Message>,
    settings: HashMap<SettingsType, Settings>,
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. Used by the test suites and for
/// local runs without `DATABASE_URL`. Each operation takes the lock once, which gives
/// the same single-document atomicity the Postgres store provides.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn page_of<T: Clone>(mut items: Vec<T>, page: Pagination) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit).unwrap_or(0);
    if offset >= items.len() {
        return Vec::new();
    }
    items.drain(offset..).take(limit).collect()
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- USERS ---

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self, page: Pagination) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self.read().users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page_of(users, page))
    }

    async fn count_users(&self, role: Option<Role>) -> Result<i64, RepositoryError> {
        let store = self.read();
        let count = store
            .users
            .values()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .count();
        Ok(count as i64)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, RepositoryError> {
        let mut store = self.write();
        if store.users.values().any(|u| u.username == username) {
            return Err(RepositoryError::Conflict(username.to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, RepositoryError> {
        let mut store = self.write();

        if let Some(name) = &changes.username {
            if store.users.values().any(|u| u.id != id && &u.username == name) {
                return Err(RepositoryError::Conflict(name.clone()));
            }
        }

        let Some(user) = store.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.write().users.remove(&id).is_some())
    }

    // --- EVENTS ---

    async fn list_events(
        &self,
        filter: &EventFilter,
        page: Pagination,
    ) -> Result<Vec<Event>, RepositoryError> {
        let mut events: Vec<Event> = self
            .read()
            .events
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(page_of(events, page))
    }

    async fn count_events(&self, filter: &EventFilter) -> Result<i64, RepositoryError> {
        let count = self.read().events.values().filter(|e| filter.matches(e)).count();
        Ok(count as i64)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, RepositoryError> {
        Ok(self.read().events.get(&id).cloned())
    }

    async fn create_event(&self, event: NewEvent) -> Result<Event, RepositoryError> {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            title: event.title,
            description: event.description,
            date: event.date,
            location: event.location,
            image_url: event.image_url,
            featured: event.featured,
            registration_link: event.registration_link,
            registration_required: event.registration_required,
            status: event.status,
            created_by: event.created_by,
            created_at: now,
            updated_at: now,
        };
        self.write().events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_event(
        &self,
        id: Uuid,
        changes: UpdateEventRequest,
    ) -> Result<Option<Event>, RepositoryError> {
        let mut store = self.write();
        let Some(event) = store.events.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply_to(event);
        event.updated_at = Utc::now();
        Ok(Some(event.clone()))
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.write().events.remove(&id).is_some())
    }

    // --- MESSAGES ---

    async fn list_messages(
        &self,
        filter: &MessageFilter,
        page: Pagination,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut messages: Vec<Message> = self
            .read()
            .messages
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(page_of(messages, page))
    }

    async fn count_messages(&self, filter: &MessageFilter) -> Result<i64, RepositoryError> {
        let count = self
            .read()
            .messages
            .values()
            .filter(|m| filter.matches(m))
            .count();
        Ok(count as i64)
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>, RepositoryError> {
        Ok(self.read().messages.get(&id).cloned())
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            name: message.name,
            email: message.email,
            subject: message.subject,
            message: message.message,
            status: MessageStatus::New,
            created_at: now,
            updated_at: now,
        };
        self.write().messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn set_message_status(
        &self,
        id: Uuid,
        status: MessageStatus,
    ) -> Result<Option<Message>, RepositoryError> {
        let mut store = self.write();
        let Some(message) = store.messages.get_mut(&id) else {
            return Ok(None);
        };
        message.status = status;
        message.updated_at = Utc::now();
        Ok(Some(message.clone()))
    }

    async fn delete_message(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.write().messages.remove(&id).is_some())
    }

    async fn message_status_counts(&self) -> Result<Vec<(MessageStatus, i64)>, RepositoryError> {
        let mut counts: HashMap<MessageStatus, i64> = HashMap::new();
        for message in self.read().messages.values() {
            *counts.entry(message.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    // --- SETTINGS ---

    async fn get_settings(
        &self,
        settings_type: SettingsType,
    ) -> Result<Option<Settings>, RepositoryError> {
        Ok(self.read().settings.get(&settings_type).cloned())
    }

    async fn merge_settings(
        &self,
        settings_type: SettingsType,
        patch: Map<String, Value>,
        updated_by: Option<Uuid>,
    ) -> Result<Settings, RepositoryError> {
        let now = Utc::now();
        let mut store = self.write();

        let settings = store.settings.entry(settings_type).or_insert_with(|| Settings {
            settings_type,
            data: settings_type.defaults(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        });

        settings.data = merge_json(std::mem::take(&mut settings.data), patch);
        if updated_by.is_some() {
            settings.updated_by = updated_by;
        }
        settings.updated_at = now;
        Ok(settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let repo = InMemoryRepository::new();
        repo.create_user("admin", "hash", Role::Admin).await.unwrap();
        let err = repo.create_user("admin", "hash", Role::Staff).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[test]
    fn page_of_past_the_end_is_empty() {
        let items = vec![1, 2, 3];
        assert!(page_of(items.clone(), Pagination::new(Some(3), Some(2))).is_empty());
        assert_eq!(page_of(items, Pagination::new(Some(2), Some(2))), vec![3]);
    }
}
