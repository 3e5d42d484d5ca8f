//! Error types for Lounge.

use thiserror::Error;

/// Common error type for Lounge.
#[derive(Error, Debug)]
pub enum LoungeError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input or configuration values.
    #[error("validation error: {0}")]
    Validation(String),

    /// The connection's own outbound queue has been closed.
    ///
    /// Raised when the writer task is gone, which only happens after the
    /// peer's socket failed or was shut down.
    #[error("connection closed")]
    Disconnected,
}

/// Result type alias for Lounge operations.
pub type Result<T> = std::result::Result<T, LoungeError>;

/// Errors returned by [`Directory`](crate::chat::Directory) operations.
///
/// All of these are connection-local and recoverable: they are rendered as a
/// chat-visible line and never terminate a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The named room does not exist.
    #[error("Room '{0}' not found")]
    RoomNotFound(String),

    /// No session is registered under that name.
    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    /// Another session already holds the name.
    #[error("Username '{0}' is already taken")]
    NameTaken(String),

    /// The session is registered but is not a member of any room.
    #[error("'{0}' is not in any room")]
    NotInRoom(String),
}
