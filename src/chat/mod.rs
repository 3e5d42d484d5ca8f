//! Chat module for Lounge.
//!
//! This module provides the shared room/session directory and the chat
//! protocol on top of it:
//! - Rooms and sessions with consistent membership
//! - Broadcast fan-out through bounded per-connection queues
//! - Join/leave/disconnect notifications
//! - Chat commands (/rooms, /join, /leave, /who, /help, /quit)

mod command;
mod directory;
mod dispatcher;
mod outbound;
mod room;
mod session;

pub use command::{
    format_help, format_members, format_rooms, format_who, get_command_help, parse_input,
    ChatCommand, ChatInput, CommandInfo, COMMAND_PREFIX, HELP_HINT,
};
pub use directory::{Delivery, Directory, DirectoryResult, JoinOutcome, RoomInfo};
pub use dispatcher::{CommandDispatcher, Dispatch, Flow, FAREWELL_BANNER, NOT_IN_ROOM_NOTICE};
pub use outbound::{Outbound, OutboundReceiver, ReservedLine};
pub use room::{ChatMessage, MessageType, Room};
pub use session::{Session, SessionInfo};
