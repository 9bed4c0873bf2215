//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - The storage backend
//! - The route table
//! - The transform cache
//! - Refresh scheduler status
//! - The shutdown signal
//! - Server configuration

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::http::cache::TransformCache;
use crate::refresh::RefreshStatus;
use crate::route_table::RouteTable;
use crate::storage::StoragePort;

/// Process-wide stop flag that tasks can await
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Request shutdown; later calls are no-ops
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so this only returns once triggered
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state shared across all handlers and the refresh task
pub struct AppState {
    /// Storage backend
    pub storage: Arc<dyn StoragePort>,

    /// Registered routes (path -> object)
    pub routes: RouteTable,

    /// Transformed image cache
    pub transform_cache: TransformCache,

    /// Refresh scheduler counters
    pub refresh: RefreshStatus,

    /// Server shutdown signal
    pub shutdown: ShutdownSignal,

    /// Server configuration
    pub config: ServerConfig,

    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration and backend
    pub fn new(config: ServerConfig, storage: Arc<dyn StoragePort>) -> Self {
        Self {
            storage,
            routes: RouteTable::new(),
            transform_cache: TransformCache::new(config.cache.clone()),
            refresh: RefreshStatus::default(),
            shutdown: ShutdownSignal::new(),
            config,
            started_at: Instant::now(),
        }
    }

    /// Seconds since the state was created
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Check if shutdown is requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_triggered()
    }
}
