//! Server configuration

use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CdnError;

/// Storage backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend class (`filesystem`, or `fs` for short)
    pub class: String,

    /// Root directory for the filesystem backend
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            class: "filesystem".to_string(),
            directory: PathBuf::from("./data"),
        }
    }
}

impl StorageConfig {
    /// Whether `class` names the filesystem backend
    pub fn is_filesystem(&self) -> bool {
        matches!(
            self.class.to_ascii_lowercase().as_str(),
            "filesystem" | "fs"
        )
    }
}

/// Route refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Delay between storage scans in seconds
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Transform cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum memory usage for transformed images in megabytes
    pub max_memory_mb: usize,

    /// Maximum number of cached transforms
    pub max_entries: usize,

    /// Time-to-live for cached transforms in seconds
    pub ttl_secs: u64,

    /// Cache transformed images at all
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 64,
            max_entries: 512,
            ttl_secs: 300, // 5 minutes
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Get maximum memory in bytes
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_mb.saturating_mul(1024 * 1024)
    }
}

/// Per-request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Upper bound on a backend read before answering 500
    pub read_timeout_secs: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: 30,
        }
    }
}

impl RequestConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Send X-Frame-Options / X-Content-Type-Options / X-XSS-Protection
    pub security_headers: bool,

    /// Extra headers added to every response
    pub extra_headers: BTreeMap<String, String>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,

    /// Storage backend
    pub storage: StorageConfig,

    /// Route refresh
    pub refresh: RefreshConfig,

    /// Transform cache
    pub cache: CacheConfig,

    /// Request limits
    pub request: RequestConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4949,
            cors_enabled: false,
            security_headers: true,
            extra_headers: BTreeMap::new(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            storage: StorageConfig::default(),
            refresh: RefreshConfig::default(),
            cache: CacheConfig::default(),
            request: RequestConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    ///
    /// IPv6 literals are bracketed so the result parses as a `SocketAddr`.
    pub fn socket_addr(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), CdnError> {
        if self.refresh.interval_secs == 0 {
            return Err(CdnError::Config(
                "refresh.interval_secs must be greater than 0".to_string(),
            ));
        }
        if !self.storage.is_filesystem() {
            return Err(CdnError::Config(format!(
                "unsupported storage class '{}'",
                self.storage.class
            )));
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            return Err(CdnError::Config(format!(
                "unknown log format '{}'",
                self.log_format
            )));
        }
        if self.request.read_timeout_secs == 0 {
            return Err(CdnError::Config(
                "request.read_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
