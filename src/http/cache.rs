//! Transform cache
//!
//! Keeps recently transcoded images in memory so repeated requests for the
//! same resize/format don't decode the source again. Entries are keyed by
//! the source object's identity (key, fetched length, scan-time etag) plus
//! the transform, so an object that changes size in storage never hits a
//! stale entry. Same-size rewrites age out with the TTL.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::config::CacheConfig;
use crate::transform::Transform;

/// Cache entry with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Bytes,
    pub created_at: SystemTime,
    pub last_accessed: SystemTime,
    pub access_count: usize,
}

impl CacheEntry {
    pub fn new(data: Bytes) -> Self {
        let now = SystemTime::now();
        Self {
            data,
            created_at: now,
            last_accessed: now,
            access_count: 1,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = SystemTime::now();
        self.access_count += 1;
    }

    pub fn age_secs(&self) -> u64 {
        self.created_at.elapsed().map(|d| d.as_secs()).unwrap_or(0)
    }

    pub fn is_expired(&self, ttl_secs: u64) -> bool {
        self.age_secs() > ttl_secs
    }
}

/// Identity of a transformed payload
#[derive(Debug, Clone, Copy)]
pub struct SourceId<'a> {
    pub key: &'a str,
    pub len: usize,
    pub etag: Option<&'a str>,
}

/// In-memory cache of transformed images
pub struct TransformCache {
    /// Cache entries (key -> entry)
    entries: DashMap<String, CacheEntry>,
    /// Current memory usage in bytes
    memory_bytes: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    config: CacheConfig,
}

impl TransformCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            memory_bytes: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            config,
        }
    }

    /// Generate cache key from components
    pub fn make_key(source: SourceId<'_>, transform: Transform) -> String {
        format!(
            "{}:{}:{}:{}",
            source.key,
            source.len,
            source.etag.unwrap_or("-"),
            transform
        )
    }

    /// Get a cached transform, dropping it if it has expired
    pub fn get(&self, source: SourceId<'_>, transform: Transform) -> Option<Bytes> {
        if !self.config.enabled {
            return None;
        }

        let key = Self::make_key(source, transform);
        let found = match self.entries.get_mut(&key) {
            Some(mut entry) if !entry.is_expired(self.config.ttl_secs) => {
                entry.touch();
                Some(entry.data.clone())
            }
            Some(_) => None,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match found {
            Some(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(data)
            }
            None => {
                // Expired
                self.remove_key(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Cache a transform result
    pub fn insert(&self, source: SourceId<'_>, transform: Transform, data: Bytes) {
        if !self.config.enabled {
            return;
        }

        let size = data.len();
        if size > self.config.max_memory_bytes() || self.config.max_entries == 0 {
            return;
        }

        let key = Self::make_key(source, transform);
        self.remove_key(&key);

        // Check memory limit before inserting
        let current = self.memory_bytes.load(Ordering::Relaxed);
        if current.saturating_add(size) > self.config.max_memory_bytes()
            || self.entries.len() >= self.config.max_entries
        {
            self.evict_if_needed(size);
        }

        // Account before the entry is visible, so whoever removes it
        // later always subtracts bytes that were added.
        self.memory_bytes.fetch_add(size, Ordering::Relaxed);
        if let Some(replaced) = self.entries.insert(key, CacheEntry::new(data)) {
            // Another request cached the same transform in the meantime
            self.memory_bytes
                .fetch_sub(replaced.data.len(), Ordering::Relaxed);
        }
    }

    fn remove_key(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.memory_bytes
                .fetch_sub(entry.data.len(), Ordering::Relaxed);
        }
    }

    /// Evict entries until `needed_size` more bytes and one more entry fit
    fn evict_if_needed(&self, needed_size: usize) {
        self.clear_expired();

        let fits = |cache: &Self| {
            cache
                .memory_bytes
                .load(Ordering::Relaxed)
                .saturating_add(needed_size)
                <= cache.config.max_memory_bytes()
                && cache.entries.len() < cache.config.max_entries
        };
        if fits(self) {
            return;
        }

        // Oldest access first
        let mut entries: Vec<(String, SystemTime)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().last_accessed))
            .collect();
        entries.sort_by_key(|(_, accessed)| *accessed);

        for (key, _) in entries {
            if fits(self) {
                break;
            }
            self.remove_key(&key);
        }
    }

    /// Clear all expired entries
    pub fn clear_expired(&self) {
        let mut freed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired(self.config.ttl_secs) {
                freed += entry.data.len();
                false
            } else {
                true
            }
        });
        self.memory_bytes.fetch_sub(freed, Ordering::Relaxed);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.config.enabled,
            entry_count: self.entries.len(),
            total_size_bytes: self.memory_usage(),
            memory_limit_bytes: self.config.max_memory_bytes(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Get the number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get current memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.memory_bytes.load(Ordering::Relaxed)
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub entry_count: usize,
    pub total_size_bytes: usize,
    pub memory_limit_bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

impl Default for TransformCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
