//! Route refresh scheduler
//!
//! A background task that re-lists the storage backend every interval and
//! registers routes for objects it hasn't seen. A failed cycle is logged
//! and counted; it never ends the loop.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::StorageResult;
use crate::state::AppState;

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle,
    Scanning,
    Stopped,
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RefreshState::Scanning,
            2 => RefreshState::Stopped,
            _ => RefreshState::Idle,
        }
    }
}

/// Observable scheduler counters
#[derive(Debug, Default)]
pub struct RefreshStatus {
    state: AtomicU8,
    running: AtomicBool,
    cycles: AtomicU64,
    failures: AtomicU64,
    registered: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl RefreshStatus {
    pub fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: RefreshState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Whether the background loop is alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Completed scan cycles, failed ones included
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Routes registered by all cycles so far
    pub fn registered(&self) -> u64 {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn summary(&self) -> RefreshSummary {
        RefreshSummary {
            state: self.state(),
            running: self.is_running(),
            cycles: self.cycles(),
            failures: self.failures(),
            registered: self.registered(),
            last_error: self.last_error(),
        }
    }
}

/// Point-in-time copy of [`RefreshStatus`]
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub state: RefreshState,
    pub running: bool,
    pub cycles: u64,
    pub failures: u64,
    pub registered: u64,
    pub last_error: Option<String>,
}

/// Periodic storage scanner feeding the route table
#[derive(Clone)]
pub struct RouteRefresher {
    name: String,
    interval: Duration,
    state: Arc<AppState>,
}

impl RouteRefresher {
    pub fn new(state: Arc<AppState>, interval: Duration) -> Self {
        Self {
            name: "update cdn routing".to_string(),
            interval,
            state,
        }
    }

    /// Start the loop on the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until the shutdown signal fires
    ///
    /// The first scan happens one interval after start. A stop request is
    /// checked before every scan; a scan already in progress completes.
    pub async fn run(self) {
        let status = &self.state.refresh;
        status.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Ticker '{}' started, interval={:?}",
            self.name,
            self.interval
        );

        let mut shutdown = self.state.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait_for(|stopped| *stopped) => {}
            }

            if self.state.is_shutdown() {
                break;
            }

            // Run the cycle as its own task so a panic is contained too
            let cycle = self.clone();
            if let Err(e) = tokio::spawn(async move { cycle.tick().await }).await {
                tracing::error!("Unable to execute ticker with name {}: {}", self.name, e);
                status.failures.fetch_add(1, Ordering::SeqCst);
                *status.last_error.lock() = Some(e.to_string());
                status.set_state(RefreshState::Idle);
            }
        }

        status.running.store(false, Ordering::SeqCst);
        status.set_state(RefreshState::Stopped);
        tracing::info!("Ticker '{}' stopped", self.name);
    }

    /// Run one scan cycle
    ///
    /// Lists the backend and registers new routes. Errors are logged and
    /// recorded, then returned for callers that want them.
    pub async fn tick(&self) -> StorageResult<usize> {
        let status = &self.state.refresh;
        let storage = &self.state.storage;
        status.set_state(RefreshState::Scanning);
        tracing::debug!("Updating CDN routing...");

        let result = storage.list_all().await.map(|objects| {
            tracing::debug!("Found {} objects to create as routes", objects.len());
            self.state
                .routes
                .diff_and_register(objects, |object| storage.http_path(object))
        });

        status.cycles.fetch_add(1, Ordering::SeqCst);
        match &result {
            Ok(added) => {
                status.registered.fetch_add(*added as u64, Ordering::SeqCst);
                if *added > 0 {
                    tracing::info!(
                        "Registered {} new route(s), {} total",
                        added,
                        self.state.routes.len()
                    );
                }
            }
            Err(e) => {
                status.failures.fetch_add(1, Ordering::SeqCst);
                *status.last_error.lock() = Some(e.to_string());
                tracing::error!("Unable to execute ticker with name {}: {}", self.name, e);
            }
        }

        // Keep Stopped if shutdown raced the scan
        if status.state() == RefreshState::Scanning {
            status.set_state(RefreshState::Idle);
        }
        result
    }
}
