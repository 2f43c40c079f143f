//! Error types for olpar-core

use thiserror::Error;

use crate::health::CloudState;

/// Result type alias using olpar-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for adapter-level operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in olpar-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Backing store error that could not be absorbed by a fallback
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// PIN did not match the selected profile
    #[error("Invalid credentials for user {0}")]
    InvalidCredentials(String),

    /// User profile not found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The acting session tried to delete its own profile
    #[error("Cannot delete the active session's own profile: {0}")]
    SelfDeletion(String),
}

/// Errors raised by the document store adapters (remote and local).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The remote database has never been provisioned
    #[error("Remote database not provisioned: {0}")]
    NotProvisioned(String),

    /// The remote rejected the credentials or security rules
    #[error("Remote permission denied: {0}")]
    PermissionDenied(String),

    /// Timeouts, 5xx responses and other recoverable remote failures
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    /// HTTP transport error
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote answered with a body we could not interpret
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),

    /// Local storage I/O error
    #[error("Local storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local storage content is not valid JSON
    #[error("Local storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local storage refuses writes (quota exceeded, disabled)
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl StoreError {
    /// Health classification for this failure.
    ///
    /// Returns `None` for transient failures, which are logged but leave the
    /// tracked cloud state untouched.
    pub const fn failure_class(&self) -> Option<CloudState> {
        match self {
            Self::NotProvisioned(_) => Some(CloudState::NotFound),
            Self::PermissionDenied(_) => Some(CloudState::Error),
            _ => None,
        }
    }
}
