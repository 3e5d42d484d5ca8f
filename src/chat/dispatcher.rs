//! Command execution against the directory.
//!
//! The dispatcher turns a parsed [`ChatCommand`] into directory calls,
//! notifications to other room members, and the reply text for the
//! requesting connection. It never writes to the requester itself.

use std::sync::Arc;

use tracing::{debug, info};

use super::command::{
    format_help, format_members, format_rooms, format_who, ChatCommand, HELP_HINT,
};
use super::directory::Directory;
use super::room::ChatMessage;

/// Notice shown when a room-bound command is used outside any room.
pub const NOT_IN_ROOM_NOTICE: &str = "[Info] You are not in any room\n";

/// Banner sent to a session that quits.
pub const FAREWELL_BANNER: &str =
    "+-------------------+\n|  Thanks for chat! |\n+-------------------+\n";

/// What the connection should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading input.
    Continue,
    /// The session has been deregistered; close the connection.
    Quit,
}

/// Reply produced by a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Text to send back to the requester.
    pub reply: String,
    /// Next step for the connection.
    pub flow: Flow,
}

impl Dispatch {
    fn reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            flow: Flow::Continue,
        }
    }
}

/// Interpreter for chat commands.
#[derive(Clone)]
pub struct CommandDispatcher {
    directory: Arc<Directory>,
}

impl CommandDispatcher {
    /// Create a dispatcher over the shared directory.
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }

    /// Execute `command` on behalf of session `name`.
    pub async fn dispatch(&self, name: &str, command: &ChatCommand) -> Dispatch {
        debug!("{} issued {}", name, command);

        match command {
            ChatCommand::Rooms => {
                Dispatch::reply(format_rooms(&self.directory.room_list().await))
            }
            ChatCommand::Join(Some(room)) => Dispatch::reply(self.join(name, room).await),
            ChatCommand::Join(None) => Dispatch::reply("[Error] Usage: /join <room_name>\n"),
            ChatCommand::Leave => Dispatch::reply(self.leave(name).await),
            ChatCommand::Who => Dispatch::reply(self.who(name).await),
            ChatCommand::Help => Dispatch::reply(format_help()),
            ChatCommand::Quit => self.quit(name).await,
            ChatCommand::Unknown(_) => {
                Dispatch::reply(format!("[Error] Unknown command\n{HELP_HINT}"))
            }
        }
    }

    async fn join(&self, name: &str, room: &str) -> String {
        let mut reply = String::new();
        if self.directory.ensure_room(room).await {
            reply.push_str(&format!("[Server] Created new room: {room}\n"));
        }

        let outcome = match self.directory.join_room(name, room).await {
            Ok(outcome) => outcome,
            Err(e) => {
                reply.push_str(&format!("[Error] {e}\n"));
                return reply;
            }
        };

        if outcome.changed {
            if let Some(previous) = outcome.previous_room.as_deref() {
                self.directory
                    .notify_room(previous, name, &ChatMessage::leave(name))
                    .await;
            }
            self.directory
                .notify_room(room, name, &ChatMessage::join(name))
                .await;
            info!("{} joined room {}", name, room);
        }

        reply.push_str(&format!("--- Joined room: {room} ---\n"));
        reply.push_str(&format!("Users in room ({}):\n", outcome.members.len()));
        reply.push_str(&format_members(&outcome.members, name));
        reply.push_str("------------------------\n");
        reply
    }

    async fn leave(&self, name: &str) -> String {
        let room = match self.directory.current_room(name).await {
            Ok(Some(room)) => room,
            Ok(None) => return NOT_IN_ROOM_NOTICE.to_string(),
            Err(e) => return format!("[Error] {e}\n"),
        };

        self.directory
            .notify_room(&room, name, &ChatMessage::leave(name))
            .await;

        match self.directory.leave_room(name).await {
            Ok(Some(left)) => {
                info!("{} left room {}", name, left);
                format!("--- Left room: {left} ---\n")
            }
            Ok(None) => NOT_IN_ROOM_NOTICE.to_string(),
            Err(e) => format!("[Error] {e}\n"),
        }
    }

    async fn who(&self, name: &str) -> String {
        let room = match self.directory.current_room(name).await {
            Ok(Some(room)) => room,
            Ok(None) => return NOT_IN_ROOM_NOTICE.to_string(),
            Err(e) => return format!("[Error] {e}\n"),
        };

        match self.directory.snapshot(&room).await {
            Ok(members) => format_who(&members, &room, name),
            Err(e) => format!("[Error] {e}\n"),
        }
    }

    /// Best-effort: announce, deregister, and always end the connection.
    async fn quit(&self, name: &str) -> Dispatch {
        if let Ok(Some(room)) = self.directory.current_room(name).await {
            self.directory
                .notify_room(&room, name, &ChatMessage::disconnect(name))
                .await;
        }

        match self.directory.deregister(name).await {
            Ok(info) => info!("{} quit after {}s", info.name, info.connected_secs()),
            Err(e) => debug!("Quit for {} found no session: {}", name, e),
        }

        Dispatch {
            reply: FAREWELL_BANNER.to_string(),
            flow: Flow::Quit,
        }
    }
}
