//! Error types shared by the playback core.

use thiserror::Error;

/// Failures talking to the audio backend (the Lavalink node).
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend unreachable or refused the voice connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected a track submission.
    #[error("track submission failed: {0}")]
    Submit(String),

    /// HTTP request to the node failed.
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    /// Unexpected payload from the node.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The node has not sent its `ready` op yet.
    #[error("node session not ready")]
    NotReady,
}

/// Errors surfaced by playback session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation needs a voice connection and the session has none.
    #[error("not connected to a voice channel")]
    NotConnected,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Playlist file could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not replace playlist file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl SessionError {
    /// True when the failure came from refusing or losing the voice connection.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            SessionError::NotConnected | SessionError::Backend(BackendError::Connection(_))
        )
    }
}
