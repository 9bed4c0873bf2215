//! Dynamic route table
//!
//! Maps `(method, path)` to the storage object a route serves. The table is
//! published as an immutable snapshot behind an `Arc`; readers clone the
//! `Arc` and never wait on a scan, writers build the next snapshot off-lock
//! and swap it in. Registration is additive: the first object registered
//! for a path keeps it for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use parking_lot::{Mutex, RwLock};

use crate::storage::StoredObject;

/// Lookup key for a route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub method: Method,
    pub http_path: String,
}

impl RouteKey {
    pub fn get(http_path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            http_path: http_path.into(),
        }
    }
}

/// A registered route
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub http_path: String,
    /// Metadata captured when the route was registered
    pub object: Arc<StoredObject>,
}

impl RouteEntry {
    pub fn storage_key(&self) -> &str {
        &self.object.key
    }
}

type Snapshot = Arc<HashMap<RouteKey, RouteEntry>>;

/// Route table shared between the refresh scheduler and request handlers
#[derive(Default)]
pub struct RouteTable {
    current: RwLock<Snapshot>,
    /// Serializes writers so concurrent scans cannot lose registrations
    writer: Mutex<()>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current immutable view of the table
    pub fn snapshot(&self) -> Snapshot {
        self.current.read().clone()
    }

    /// Find the route for a method and path
    pub fn lookup(&self, method: &Method, http_path: &str) -> Option<RouteEntry> {
        let key = RouteKey {
            method: method.clone(),
            http_path: http_path.to_string(),
        };
        self.snapshot().get(&key).cloned()
    }

    /// Whether any method is registered for `http_path`
    pub fn has_path(&self, http_path: &str) -> bool {
        self.snapshot()
            .keys()
            .any(|key| key.http_path == http_path)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a `GET` route for every object that doesn't have one yet
    ///
    /// `path_mapper` gives the canonical HTTP path of an object; objects it
    /// maps to `None` are skipped. Returns the number of new routes.
    pub fn diff_and_register<F>(&self, objects: Vec<StoredObject>, path_mapper: F) -> usize
    where
        F: Fn(&StoredObject) -> Option<String>,
    {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let mut next: HashMap<RouteKey, RouteEntry> = (*current).clone();

        let mut count = 0;
        for object in objects {
            let Some(http_path) = path_mapper(&object) else {
                tracing::debug!("No HTTP path for object {}, skipping", object.key);
                continue;
            };

            let key = RouteKey::get(http_path.clone());
            if next.contains_key(&key) {
                continue;
            }

            tracing::debug!("Registering route GET {} -> {}", http_path, object.key);
            next.insert(
                key,
                RouteEntry {
                    http_path,
                    object: Arc::new(object),
                },
            );
            count += 1;
        }

        if count == 0 {
            return 0;
        }

        *self.current.write() = Arc::new(next);
        count
    }
}
