use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Largest accepted upload: 5 MB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// URL prefix under which stored files are served back.
pub const PUBLIC_PREFIX: &str = "/uploads";

const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage failure: {0}")]
    Backend(String),

    #[error("storage key already in use: {0}")]
    AlreadyExists(String),
}

/// Keys tried by `save_event_image` before giving up on a busy millisecond window.
const MAX_KEY_ATTEMPTS: i64 = 16;

// 1. StorageService Contract
/// StorageService
///
/// Defines the contract for persisting uploaded files. Handlers only see the trait,
/// so tests swap the disk-backed store for the in-memory mock.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates whatever the backend needs before the first write. Safe to call
    /// repeatedly.
    async fn ensure_ready(&self) -> Result<(), StorageError>;

    /// Stores `bytes` under `key` (a relative, `/`-separated path) and returns the
    /// public path the file is served from. Never overwrites: an existing key fails
    /// with `AlreadyExists`.
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError>;
}

// 2. The Real Implementation (local disk)
/// LocalDiskStorage
///
/// Writes files below a root directory that the router serves at `/uploads`.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(self.root.join("events")).await?;
        Ok(())
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let key = sanitize_key(key);
        if key.is_empty() {
            return Err(StorageError::Backend("empty storage key".to_string()));
        }

        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(key.clone()),
                _ => StorageError::Io(e),
            })?;
        file.write_all(bytes).await?;
        file.flush().await?;

        tracing::info!(path = %path.display(), size = bytes.len(), "stored upload");
        Ok(format!("{PUBLIC_PREFIX}/{key}"))
    }
}

/// sanitize_key
///
/// Prevents path traversal by removing directory navigation components
/// (e.g., `..`, `.`) and empty segments from a key.
pub fn sanitize_key(key: &str) -> String {
    key.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Checks an uploaded image against the accepted MIME types and the size cap.
/// Returns the canonical extension for the type.
pub fn validate_image(content_type: Option<&str>, size: usize) -> Result<&'static str, String> {
    let content_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .ok_or_else(|| "Please upload an image".to_string())?;

    let extension = ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| "Only image files are allowed".to_string())?;

    if size == 0 {
        return Err("Please upload an image".to_string());
    }
    if size > MAX_IMAGE_BYTES {
        return Err("Image must be 5MB or smaller".to_string());
    }
    Ok(extension)
}

/// Builds the storage key for an event image: `events/event_<millis>.<ext>`.
/// The extension comes from the original file name when it is a plain alphanumeric
/// suffix, else from the MIME type.
pub fn event_image_key(original_name: Option<&str>, fallback_ext: &str, millis: i64) -> String {
    let extension = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| fallback_ext.to_string());

    format!("events/event_{millis}.{extension}")
}

/// save_event_image
///
/// Stores an event image under the first free `events/event_<millis>.<ext>` key,
/// starting at `millis` and stepping one millisecond per collision. Returns the key
/// and the public path.
pub async fn save_event_image(
    storage: &dyn StorageService,
    original_name: Option<&str>,
    fallback_ext: &str,
    bytes: &[u8],
    millis: i64,
) -> Result<(String, String), StorageError> {
    for offset in 0..MAX_KEY_ATTEMPTS {
        let key = event_image_key(original_name, fallback_ext, millis + offset);
        match storage.save(&key, bytes).await {
            Ok(path) => return Ok((key, path)),
            Err(StorageError::AlreadyExists(_)) => {
                tracing::debug!(%key, "upload key taken, trying the next one");
            }
            Err(e) => return Err(e),
        }
    }
    Err(StorageError::Backend(format!(
        "no free upload key near event_{millis}"
    )))
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// Records saved keys in memory instead of touching the disk. Like the disk store,
/// it refuses to save a key twice.
#[derive(Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    saved: Mutex<Vec<(String, usize)>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Keys and sizes of everything saved so far.
    pub fn saved(&self) -> Vec<(String, usize)> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Backend(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        let key = sanitize_key(key);
        if let Ok(mut saved) = self.saved.lock() {
            if saved.iter().any(|(existing, _)| *existing == key) {
                return Err(StorageError::AlreadyExists(key));
            }
            saved.push((key.clone(), bytes.len()));
        }
        Ok(format!("{PUBLIC_PREFIX}/{key}"))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
