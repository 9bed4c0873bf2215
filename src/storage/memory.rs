//! In-memory storage backend (for testing)

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use super::{ContentTypeHint, StoragePort, StoredObject};
use crate::error::{StorageError, StorageResult};

/// In-memory storage for unit tests
///
/// Keys are used verbatim as HTTP paths. Failures, slow reads, panics and
/// stalled listings can be injected to exercise error paths.
#[derive(Default)]
pub struct InMemoryStorage {
    objects: RwLock<BTreeMap<String, (StoredObject, Bytes)>>,
    failing_lists: AtomicUsize,
    failing_opens: AtomicUsize,
    list_calls: AtomicUsize,
    open_delay: Mutex<Option<Duration>>,
    panic_on_open: AtomicBool,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object with a known content type
    pub fn insert(&self, key: &str, data: impl Into<Bytes>, content_type: &str) {
        self.insert_with_hint(key, data, ContentTypeHint::known(content_type));
    }

    pub fn insert_with_hint(&self, key: &str, data: impl Into<Bytes>, hint: ContentTypeHint) {
        let data = data.into();
        let object = StoredObject::new(key, data.len() as u64, hint);
        self.objects
            .write()
            .insert(key.to_string(), (object, data));
    }

    pub fn remove(&self, key: &str) {
        self.objects.write().remove(key);
    }

    /// Make the next `count` calls to `list_all` fail
    pub fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` calls to `open` fail with a transient error
    pub fn fail_next_opens(&self, count: usize) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Make every `open` take at least `delay`
    pub fn delay_opens(&self, delay: Duration) {
        *self.open_delay.lock() = Some(delay);
    }

    /// Make `open` panic
    pub fn panic_on_open(&self) {
        self.panic_on_open.store(true, Ordering::SeqCst);
    }

    /// Stall every `list_all` until the returned handle is notified
    pub fn hold_lists(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock() = Some(gate.clone());
        gate
    }

    /// Number of `list_all` calls so far, failed ones included
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StoragePort for InMemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_all(&self) -> StorageResult<Vec<StoredObject>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.list_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if Self::take_failure(&self.failing_lists) {
            return Err(StorageError::Unavailable("injected list failure".into()));
        }

        Ok(self
            .objects
            .read()
            .values()
            .map(|(object, _)| object.clone())
            .collect())
    }

    async fn open(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let delay = *self.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on_open.load(Ordering::SeqCst) {
            panic!("injected open panic for {}", key);
        }
        if Self::take_failure(&self.failing_opens) {
            return Err(StorageError::Unavailable("injected open failure".into()));
        }
        Ok(self.objects.read().get(key).map(|(_, data)| data.clone()))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().contains_key(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().remove(key);
        Ok(())
    }

    async fn upload(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        let hint = content_type
            .map(ContentTypeHint::known)
            .unwrap_or(ContentTypeHint::Unresolved);
        self.insert_with_hint(key, data, hint);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_list_open() {
        let storage = InMemoryStorage::new();
        storage.insert("images/logo.png", vec![1u8, 2, 3], "image/png");

        let objects = storage.list_all().await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].size, 3);
        assert_eq!(
            storage.http_path(&objects[0]).as_deref(),
            Some("/images/logo.png")
        );

        let data = storage.open("images/logo.png").await.unwrap().unwrap();
        assert_eq!(&data[..], &[1, 2, 3]);
        assert!(storage.open("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let storage = InMemoryStorage::new();
        storage.fail_next_lists(1);

        assert!(storage.list_all().await.is_err());
        assert!(storage.list_all().await.is_ok());
        assert_eq!(storage.list_calls(), 2);

        storage.fail_next_opens(1);
        assert!(storage.open("x").await.is_err());
        assert!(storage.open("x").await.unwrap().is_none());
    }
}
