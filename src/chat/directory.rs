//! Shared registry of chat rooms and sessions.
//!
//! The directory is the single source of truth for membership. Every
//! mutation takes the write lock for its whole duration; queries take the
//! read lock. Fan-out resolves recipients under the read lock and releases
//! it before enqueueing into any peer's outbound queue.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::outbound::{Outbound, ReservedLine};
use super::room::{ChatMessage, Room};
use super::session::{Session, SessionInfo};
use crate::error::DirectoryError;

/// Result type for directory operations.
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Information about a chat room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// Room name.
    pub name: String,
    /// Number of members.
    pub member_count: usize,
}

/// Result of a successful [`Directory::join_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Room the session is now in.
    pub room: String,
    /// Room the session left to join, if it moved.
    pub previous_room: Option<String>,
    /// False if the session was already a member and nothing changed.
    pub changed: bool,
    /// Members of the joined room, taken in the same critical section.
    pub members: Vec<String>,
}

/// Counts from one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients whose queue accepted the line.
    pub delivered: usize,
    /// Recipients whose queue was full or closed.
    pub dropped: usize,
}

#[derive(Debug, Default)]
struct DirectoryState {
    rooms: BTreeMap<String, Room>,
    sessions: HashMap<String, Session>,
}

impl DirectoryState {
    /// Members of `room` other than `except`, with their delivery handles.
    fn peers(&self, room: &str, except: &str) -> Vec<(String, Outbound)> {
        let Some(room) = self.rooms.get(room) else {
            return Vec::new();
        };

        room.members()
            .filter(|name| *name != except)
            .filter_map(|name| {
                self.sessions
                    .get(name)
                    .map(|session| (name.to_string(), session.outbound().clone()))
            })
            .collect()
    }
}

/// Registry of rooms and sessions shared by all connections.
pub struct Directory {
    state: RwLock<DirectoryState>,
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
        }
    }

    /// Create a directory pre-seeded with the given rooms.
    pub fn with_rooms<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = DirectoryState::default();
        for name in names {
            let name = name.into();
            state.rooms.insert(name.clone(), Room::new(name));
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Register a session and place it in `initial_room`.
    ///
    /// Fails if the room does not exist or the name is already registered.
    pub async fn register(
        &self,
        name: &str,
        outbound: Outbound,
        initial_room: &str,
    ) -> DirectoryResult<SessionInfo> {
        self.insert_session(name, outbound, initial_room, None).await
    }

    /// Register a session, queueing `greeting` ahead of anything a peer can
    /// send it.
    ///
    /// The greeting is committed while the write lock is held, so no
    /// broadcast can reach the new session first. On failure the reserved
    /// slot is released and nothing is sent.
    pub async fn register_greeted(
        &self,
        name: &str,
        outbound: Outbound,
        initial_room: &str,
        greeting: ReservedLine,
    ) -> DirectoryResult<SessionInfo> {
        self.insert_session(name, outbound, initial_room, Some(greeting))
            .await
    }

    async fn insert_session(
        &self,
        name: &str,
        outbound: Outbound,
        initial_room: &str,
        greeting: Option<ReservedLine>,
    ) -> DirectoryResult<SessionInfo> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let Some(room) = state.rooms.get_mut(initial_room) else {
            return Err(DirectoryError::RoomNotFound(initial_room.to_string()));
        };
        if state.sessions.contains_key(name) {
            return Err(DirectoryError::NameTaken(name.to_string()));
        }

        if let Some(greeting) = greeting {
            greeting.commit();
        }
        room.insert(name);
        let session = Session::new(name, outbound, Some(initial_room.to_string()));
        let info = session.info();
        state.sessions.insert(name.to_string(), session);

        info!(
            "Registered session {} in room {} (total: {})",
            name,
            initial_room,
            state.sessions.len()
        );
        Ok(info)
    }

    /// Remove a session from its room and from the registry.
    ///
    /// A second call for the same name reports `SessionNotFound`.
    pub async fn deregister(&self, name: &str) -> DirectoryResult<SessionInfo> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let session = state
            .sessions
            .remove(name)
            .ok_or_else(|| DirectoryError::SessionNotFound(name.to_string()))?;

        if let Some(room) = session.current_room() {
            if let Some(room) = state.rooms.get_mut(room) {
                room.remove(name);
            }
        }

        info!(
            "Deregistered session {} (total: {})",
            name,
            state.sessions.len()
        );
        Ok(session.info())
    }

    /// Create the room if it does not exist.
    ///
    /// Returns true if a room was created.
    pub async fn ensure_room(&self, name: &str) -> bool {
        let mut state = self.state.write().await;
        if state.rooms.contains_key(name) {
            return false;
        }

        state.rooms.insert(name.to_string(), Room::new(name));
        info!("Created room {} (total: {})", name, state.rooms.len());
        true
    }

    /// Move a session into `room`.
    ///
    /// Leaving the previous room and entering the new one happen under one
    /// write lock, so no observer sees the session in zero or two rooms.
    /// Joining the room the session is already in changes nothing.
    pub async fn join_room(&self, name: &str, room: &str) -> DirectoryResult<JoinOutcome> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if !state.rooms.contains_key(room) {
            return Err(DirectoryError::RoomNotFound(room.to_string()));
        }
        let session = state
            .sessions
            .get_mut(name)
            .ok_or_else(|| DirectoryError::SessionNotFound(name.to_string()))?;

        let previous = session.current_room().map(str::to_string);
        let changed = previous.as_deref() != Some(room);

        if changed {
            if let Some(previous) = previous.as_deref() {
                if let Some(previous) = state.rooms.get_mut(previous) {
                    previous.remove(name);
                }
            }
            if let Some(target) = state.rooms.get_mut(room) {
                target.insert(name);
            }
            session.set_current_room(Some(room.to_string()));
            debug!("Session {} moved {:?} -> {}", name, previous, room);
        }

        let members = state
            .rooms
            .get(room)
            .map(|r| r.members().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(JoinOutcome {
            room: room.to_string(),
            previous_room: if changed { previous } else { None },
            changed,
            members,
        })
    }

    /// Take a session out of its current room.
    ///
    /// Returns the room that was left, or `None` if the session was in no room.
    pub async fn leave_room(&self, name: &str) -> DirectoryResult<Option<String>> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let session = state
            .sessions
            .get_mut(name)
            .ok_or_else(|| DirectoryError::SessionNotFound(name.to_string()))?;

        let Some(room) = session.current_room().map(str::to_string) else {
            return Ok(None);
        };

        if let Some(r) = state.rooms.get_mut(&room) {
            r.remove(name);
        }
        session.set_current_room(None);

        debug!("Session {} left room {}", name, room);
        Ok(Some(room))
    }

    /// Send a chat line from `sender` to every other member of its room.
    ///
    /// A full or closed recipient queue is logged and skipped; it never fails
    /// the broadcast.
    pub async fn broadcast(&self, sender: &str, text: &str) -> DirectoryResult<Delivery> {
        let recipients = {
            let state = self.state.read().await;
            let session = state
                .sessions
                .get(sender)
                .ok_or_else(|| DirectoryError::SessionNotFound(sender.to_string()))?;
            let room = session
                .current_room()
                .ok_or_else(|| DirectoryError::NotInRoom(sender.to_string()))?;
            state.peers(room, sender)
        };

        Ok(deliver(&recipients, &ChatMessage::chat(sender, text)))
    }

    /// Deliver a message to every member of `room` except `except`.
    ///
    /// Unknown rooms deliver to nobody.
    pub async fn notify_room(&self, room: &str, except: &str, message: &ChatMessage) -> Delivery {
        let recipients = self.state.read().await.peers(room, except);
        deliver(&recipients, message)
    }

    /// Member names of a room, ordered by name.
    pub async fn snapshot(&self, room: &str) -> DirectoryResult<Vec<String>> {
        let state = self.state.read().await;
        state
            .rooms
            .get(room)
            .map(|r| r.members().map(str::to_string).collect())
            .ok_or_else(|| DirectoryError::RoomNotFound(room.to_string()))
    }

    /// All rooms with their member counts, ordered by room name.
    pub async fn room_list(&self) -> Vec<RoomInfo> {
        let state = self.state.read().await;
        state
            .rooms
            .values()
            .map(|room| RoomInfo {
                name: room.name().to_string(),
                member_count: room.member_count(),
            })
            .collect()
    }

    /// The room a session is currently in.
    pub async fn current_room(&self, name: &str) -> DirectoryResult<Option<String>> {
        let state = self.state.read().await;
        state
            .sessions
            .get(name)
            .map(|s| s.current_room().map(str::to_string))
            .ok_or_else(|| DirectoryError::SessionNotFound(name.to_string()))
    }

    /// Information about a registered session.
    pub async fn session(&self, name: &str) -> Option<SessionInfo> {
        self.state.read().await.sessions.get(name).map(Session::info)
    }

    /// Number of registered sessions.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Number of rooms.
    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

/// Enqueue one formatted line into each recipient's queue.
fn deliver(recipients: &[(String, Outbound)], message: &ChatMessage) -> Delivery {
    let line = Arc::new(message.format());
    let mut delivery = Delivery::default();

    for (name, outbound) in recipients {
        if outbound.try_deliver(Arc::clone(&line)) {
            delivery.delivered += 1;
        } else {
            delivery.dropped += 1;
            warn!(
                "Dropped {} message from {} for {} (dropped total: {})",
                message.message_type,
                message.sender_name,
                name,
                outbound.dropped_count()
            );
        }
    }

    delivery
}
