use bridgepoint_api::storage::{
    LocalDiskStorage, MockStorageService, PUBLIC_PREFIX, StorageError, StorageService,
    event_image_key, sanitize_key, save_event_image,
};
use std::path::PathBuf;
use uuid::Uuid;

/// A fresh directory under the system temp dir, removed when dropped.
struct TempRoot(PathBuf);

impl TempRoot {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("bridgepoint-storage-{}", Uuid::new_v4())))
    }
}

impl Drop for TempRoot {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[tokio::test]
async fn test_ensure_ready_creates_events_directory() {
    let root = TempRoot::new();
    let storage = LocalDiskStorage::new(root.0.clone());

    storage.ensure_ready().await.unwrap();
    // Idempotent.
    storage.ensure_ready().await.unwrap();

    assert!(root.0.join("events").is_dir());
}

#[tokio::test]
async fn test_save_writes_bytes_and_returns_public_path() {
    let root = TempRoot::new();
    let storage = LocalDiskStorage::new(root.0.clone());
    let key = event_image_key(Some("flyer.png"), "png", 1_700_000_000_000);

    let public_path = storage.save(&key, b"\x89PNG fake").await.unwrap();

    assert_eq!(public_path, "/uploads/events/event_1700000000000.png");
    let written = std::fs::read(root.0.join("events/event_1700000000000.png")).unwrap();
    assert_eq!(written, b"\x89PNG fake");
}

#[tokio::test]
async fn test_save_cannot_escape_root() {
    let root = TempRoot::new();
    let storage = LocalDiskStorage::new(root.0.join("inner"));

    let public_path = storage.save("../../escape.txt", b"x").await.unwrap();

    assert_eq!(public_path, format!("{PUBLIC_PREFIX}/escape.txt"));
    assert!(root.0.join("inner/escape.txt").is_file());
    assert!(!root.0.join("escape.txt").exists());
}

#[tokio::test]
async fn test_save_rejects_empty_key() {
    let root = TempRoot::new();
    let storage = LocalDiskStorage::new(root.0.clone());

    let err = storage.save("../..", b"x").await.unwrap_err();
    assert!(matches!(err, StorageError::Backend(_)));
}

#[tokio::test]
async fn test_save_never_overwrites_existing_file() {
    let root = TempRoot::new();
    let storage = LocalDiskStorage::new(root.0.clone());
    let key = event_image_key(Some("flyer.png"), "png", 42);

    storage.save(&key, b"first").await.unwrap();
    let err = storage.save(&key, b"second").await.unwrap_err();

    assert!(matches!(err, StorageError::AlreadyExists(_)));
    let written = std::fs::read(root.0.join("events/event_42.png")).unwrap();
    assert_eq!(written, b"first");
}

#[tokio::test]
async fn test_event_images_in_same_millisecond_get_distinct_keys() {
    let root = TempRoot::new();
    let storage = LocalDiskStorage::new(root.0.clone());

    let (first_key, first_path) = save_event_image(&storage, Some("a.png"), "png", b"one", 1000)
        .await
        .unwrap();
    let (second_key, second_path) =
        save_event_image(&storage, Some("b.png"), "png", b"two", 1000)
            .await
            .unwrap();

    assert_eq!(first_key, "events/event_1000.png");
    assert_eq!(second_key, "events/event_1001.png");
    assert_eq!(second_path, "/uploads/events/event_1001.png");
    assert_ne!(first_path, second_path);
    assert_eq!(std::fs::read(root.0.join("events/event_1000.png")).unwrap(), b"one");
    assert_eq!(std::fs::read(root.0.join("events/event_1001.png")).unwrap(), b"two");
}

#[tokio::test]
async fn test_mock_refuses_duplicate_keys() {
    let storage = MockStorageService::new();
    storage.save("events/a.png", b"x").await.unwrap();

    let err = storage.save("events/a.png", b"y").await.unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));
    assert_eq!(storage.saved().len(), 1);
}

#[tokio::test]
async fn test_mock_records_saves() {
    let storage = MockStorageService::new();
    let path = storage.save("events/a.png", &[0u8; 16]).await.unwrap();

    assert_eq!(path, "/uploads/events/a.png");
    assert_eq!(storage.saved(), vec![("events/a.png".to_string(), 16)]);
}

#[tokio::test]
async fn test_mock_failure_mode() {
    let storage = MockStorageService::new_failing();
    assert!(storage.save("events/a.png", b"x").await.is_err());
    assert!(storage.saved().is_empty());
}

#[test]
fn test_sanitize_key_keeps_nested_paths() {
    assert_eq!(sanitize_key("events/event_1.png"), "events/event_1.png");
    assert_eq!(sanitize_key("/events/../event_1.png"), "events/event_1.png");
}
