//! Local filesystem storage backend

use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;

use super::sniff::content_type_for_extension;
use super::{ContentTypeHint, StoragePort, StoredObject};
use crate::error::{StorageError, StorageResult};

/// Filesystem storage
///
/// Every regular file below `root` is an object. Object keys are absolute
/// paths; the HTTP path is the key relative to `root`.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// Open storage at the given root directory
    ///
    /// Creates the directory if it doesn't exist.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;
        let root = fs::canonicalize(root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key (absolute under root, or root-relative) to a path
    ///
    /// Only plain path components are accepted, so a key can never
    /// address anything outside the root.
    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        let path = Path::new(key);
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root)
                .map_err(|_| StorageError::InvalidKey(key.to_string()))?
        } else {
            path
        };

        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidKey(key.to_string())),
            }
        }

        if resolved == self.root {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(resolved)
    }

    fn describe(&self, path: &Path, metadata: &std::fs::Metadata) -> Option<StoredObject> {
        let key = path.to_str()?.to_string();
        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(content_type_for_extension)
            .map(ContentTypeHint::known)
            .unwrap_or(ContentTypeHint::Unresolved);

        let modified = metadata.modified().ok();
        let etag = modified.map(|m| {
            let nanos = m
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default();
            format!("{:x}-{:x}", metadata.len(), nanos)
        });

        Some(StoredObject {
            key,
            size: metadata.len(),
            content_type,
            created_at: metadata.created().ok().map(to_utc),
            modified_at: modified.map(to_utc),
            etag,
        })
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(false)
}

#[async_trait]
impl StoragePort for FilesystemStorage {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn list_all(&self) -> StorageResult<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if is_hidden(&entry.file_name()) {
                    continue;
                }

                // Symlinks are not followed
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let metadata = entry.metadata().await?;
                    match self.describe(&path, &metadata) {
                        Some(object) => objects.push(object),
                        None => tracing::warn!("Skipping non UTF-8 path {:?}", path),
                    }
                }
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn open(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(m) if m.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> StorageResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;
        Ok(())
    }

    fn http_path(&self, object: &StoredObject) -> Option<String> {
        let relative = Path::new(&object.key).strip_prefix(&self.root).ok()?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_str()?),
                _ => return None,
            }
        }

        if segments.is_empty() {
            return None;
        }
        Some(format!("/{}", segments.join("/")))
    }
}
