use thiserror::Error;

/// Main error type for the CDN server
#[derive(Error, Debug)]
pub enum CdnError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors surfaced by a storage backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The backend could not answer right now; the object may still exist.
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether this error means the object is absent rather than unreachable
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Image transcoding errors
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("The ?resize parameters can only accept 256, 512, 1024, and 2048 (got {0:?}).")]
    InvalidResize(String),

    #[error("We only accept jpg and png transformation (got {0:?}).")]
    InvalidFormat(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CdnError>;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;
