//! Error types for the calmirror engine.

use thiserror::Error;

/// Errors that can occur while mirroring a calendar.
#[derive(Error, Debug)]
pub enum CalMirrorError {
    /// The remote rejected the stored sync cursor (expired or too old).
    #[error("Sync token rejected by remote")]
    TokenInvalid,

    /// Network failure, rate limiting or a 5xx from the remote.
    #[error("Remote request failed: {0}")]
    Transient(String),

    #[error("User {0} has not connected a calendar")]
    UserNotConnected(String),

    /// The stored mirror blob could not be decoded.
    #[error("Stored events for {user} are corrupt: {reason}")]
    MalformedMirror { user: String, reason: String },

    #[error("No watch channel stored for {0}")]
    ChannelNotFound(String),

    /// The remote answered 404/410 for the addressed resource.
    #[error("Remote resource not found: {0}")]
    RemoteNotFound(String),

    #[error("Remote rejected request: {0}")]
    Remote(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CalMirrorError {
    /// Errors after which the local state is rebuilt with a full sync.
    pub fn requires_full_resync(&self) -> bool {
        matches!(
            self,
            CalMirrorError::TokenInvalid | CalMirrorError::MalformedMirror { .. }
        )
    }
}

/// Result type alias for calmirror operations.
pub type CalMirrorResult<T> = Result<T, CalMirrorError>;
