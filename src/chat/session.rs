//! Registered chat sessions.

use chrono::{DateTime, Utc};

use super::outbound::Outbound;

/// Server-side identity of one connected, named client.
///
/// Owned by the [`Directory`](super::Directory) once registered.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session name. Immutable once registered.
    name: String,
    /// Delivery handle for this peer. The connection owns the queue; the
    /// directory only enqueues into it.
    outbound: Outbound,
    /// Room the session is currently in.
    current_room: Option<String>,
    /// When the session was registered.
    connected_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session placed in `room`.
    pub(crate) fn new(name: impl Into<String>, outbound: Outbound, room: Option<String>) -> Self {
        Self {
            name: name.into(),
            outbound,
            current_room: room,
            connected_at: Utc::now(),
        }
    }

    /// Get the session name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the delivery handle.
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Get the current room name.
    pub fn current_room(&self) -> Option<&str> {
        self.current_room.as_deref()
    }

    pub(crate) fn set_current_room(&mut self, room: Option<String>) {
        self.current_room = room;
    }

    /// Get the registration timestamp.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Snapshot this session for external queries.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            name: self.name.clone(),
            current_room: self.current_room.clone(),
            connected_at: self.connected_at,
        }
    }
}

/// Information about a session for external queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session name.
    pub name: String,
    /// Current room, if any.
    pub current_room: Option<String>,
    /// When the session was registered.
    pub connected_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Whole seconds elapsed since registration.
    pub fn connected_secs(&self) -> i64 {
        (Utc::now() - self.connected_at).num_seconds().max(0)
    }
}
