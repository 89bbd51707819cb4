//! Error types for the registry sync client

use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Malformed frames on the wire
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Failed to decode message: {source}")]
    Decode { source: serde_json::Error },

    #[error("Failed to encode message: {source}")]
    Encode { source: serde_json::Error },
}

/// Errors raised while connecting to or syncing with the hub
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    CredentialUnavailable(String),

    #[error("WebSocket connection error: {0}")]
    Transport(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("Authentication failed: {0}")]
    AuthInvalid(String),

    /// The session ended before any registry data was joined
    #[error("{0}")]
    SessionFailed(String),

    #[error("Not connected to Home Assistant")]
    NotConnected,

    #[error("Sync engine has stopped")]
    EngineStopped,
}

impl SyncError {
    pub fn transport(message: impl std::fmt::Display) -> Self {
        SyncError::Transport(message.to_string())
    }
}
