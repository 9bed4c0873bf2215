//! Storage port
//!
//! The uniform contract every object-storage backend implements:
//! - Enumerating all objects with their metadata
//! - Opening an object by key
//! - Existence checks, deletion and upload
//! - Mapping an object to its canonical HTTP path
//! - Sniffing a content type from raw bytes

pub mod filesystem;
#[cfg(test)]
pub mod memory;
pub mod sniff;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StorageResult;

pub use filesystem::FilesystemStorage;
#[cfg(test)]
pub use memory::InMemoryStorage;

/// Content type as reported by a backend at scan time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ContentTypeHint {
    /// The backend knows the MIME type.
    Known(String),
    /// The backend could not tell; the payload must be sniffed.
    Unresolved,
}

impl ContentTypeHint {
    pub fn known(value: impl Into<String>) -> Self {
        ContentTypeHint::Known(value.into())
    }
}

/// Metadata snapshot of one backend object as of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    /// Storage-relative (or backend-absolute) key, unique per backend
    pub key: String,
    pub size: u64,
    pub content_type: ContentTypeHint,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

impl StoredObject {
    /// Create an object with no timestamps or etag
    pub fn new(key: impl Into<String>, size: u64, content_type: ContentTypeHint) -> Self {
        Self {
            key: key.into(),
            size,
            content_type,
            created_at: None,
            modified_at: None,
            etag: None,
        }
    }
}

/// Object-storage backend consumed by the route table and the request handler
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Short backend name used in logs and `/info`
    fn name(&self) -> &'static str;

    /// Enumerate every object the backend holds
    async fn list_all(&self) -> StorageResult<Vec<StoredObject>>;

    /// Read an object fully into memory
    ///
    /// Returns `Ok(None)` when the object does not exist. Transient
    /// failures are reported as errors so callers can tell them apart.
    async fn open(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Check whether an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete an object; deleting a missing object is not an error
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Store an object, replacing any previous content under `key`
    async fn upload(&self, key: &str, data: Bytes, content_type: Option<&str>)
        -> StorageResult<()>;

    /// Canonical HTTP path (starting with `/`) for an object
    ///
    /// Returning `None` means the object is not served.
    fn http_path(&self, object: &StoredObject) -> Option<String> {
        normalize_http_path(&object.key)
    }

    /// Detect a MIME type from the leading bytes of a payload
    fn sniff_content_type(&self, data: &[u8]) -> String {
        sniff::sniff(data).to_string()
    }
}

/// Turn a slash-separated key into a rooted HTTP path
///
/// Empty keys and keys made only of separators have no path.
pub fn normalize_http_path(key: &str) -> Option<String> {
    let segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
        return None;
    }
    Some(format!("/{}", segments.join("/")))
}
