//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section except
//! `[server]` is optional and falls back to the defaults in
//! [`crate::config`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{CacheConfig, RefreshConfig, RequestConfig, ServerConfig, StorageConfig};
use crate::error::{CdnError, Result};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Storage backend settings
    pub storage: Option<StorageSettings>,
    /// Route refresh settings
    pub refresh: Option<RefreshSettings>,
    /// Transform cache settings
    pub cache: Option<CacheSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Request settings
    pub request: Option<RequestSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
    /// Send the standard security headers
    pub security_headers: Option<bool>,
    /// Extra headers added to every response
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Backend class (filesystem, fs)
    pub class: String,
    /// Root directory for the filesystem backend
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// Delay between storage scans in seconds
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum memory usage in MB
    pub max_memory_mb: usize,
    /// Maximum number of cached transforms
    pub max_entries: usize,
    /// TTL for cached transforms in seconds
    pub ttl_secs: u64,
    /// Enable the transform cache
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSettings {
    /// Backend read timeout in seconds
    pub read_timeout_secs: u64,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| {
            CdnError::Config(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| CdnError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: ServerSettings {
                host: defaults.host,
                port: defaults.port,
                cors_enabled: Some(defaults.cors_enabled),
                security_headers: Some(defaults.security_headers),
                extra_headers: defaults.extra_headers,
            },
            storage: Some(StorageSettings {
                class: defaults.storage.class,
                directory: Some(defaults.storage.directory),
            }),
            refresh: Some(RefreshSettings {
                interval_secs: defaults.refresh.interval_secs,
            }),
            cache: Some(CacheSettings {
                max_memory_mb: defaults.cache.max_memory_mb,
                max_entries: defaults.cache.max_entries,
                ttl_secs: defaults.cache.ttl_secs,
                enabled: Some(defaults.cache.enabled),
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some(defaults.log_format),
            }),
            request: Some(RequestSettings {
                read_timeout_secs: defaults.request.read_timeout_secs,
            }),
        }
    }

    /// Convert to a validated ServerConfig
    pub fn into_server_config(self) -> Result<ServerConfig> {
        let defaults = ServerConfig::default();

        let storage = match self.storage {
            Some(s) => StorageConfig {
                class: s.class,
                directory: s.directory.unwrap_or(defaults.storage.directory),
            },
            None => defaults.storage,
        };

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or(defaults.log_format)),
            None => (defaults.log_level, defaults.log_format),
        };

        let config = ServerConfig {
            host: self.server.host,
            port: self.server.port,
            cors_enabled: self.server.cors_enabled.unwrap_or(defaults.cors_enabled),
            security_headers: self
                .server
                .security_headers
                .unwrap_or(defaults.security_headers),
            extra_headers: self.server.extra_headers,
            log_level,
            log_format,
            storage,
            refresh: self
                .refresh
                .map(|r| RefreshConfig {
                    interval_secs: r.interval_secs,
                })
                .unwrap_or(defaults.refresh),
            cache: self
                .cache
                .map(|c| CacheConfig {
                    max_memory_mb: c.max_memory_mb,
                    max_entries: c.max_entries,
                    ttl_secs: c.ttl_secs,
                    enabled: c.enabled.unwrap_or(true),
                })
                .unwrap_or(defaults.cache),
            request: self
                .request
                .map(|r| RequestConfig {
                    read_timeout_secs: r.read_timeout_secs,
                })
                .unwrap_or(defaults.request),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Load the server configuration from `path`
///
/// A missing file yields the defaults; a file that exists but cannot be
/// parsed or validated is an error.
pub fn load_server_config<P: AsRef<Path>>(path: P) -> Result<ServerConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ServerConfig::default());
    }
    ConfigFile::from_file(path)?.into_server_config()
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
