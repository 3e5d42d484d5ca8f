//! Chat server module.
//!
//! This module provides the TCP listener, line input, the per-connection
//! writer task, and the connection state machine that speaks the chat
//! protocol.

mod connection;
pub mod input;
mod listener;
mod writer;

pub use connection::{
    handle_connection, welcome_banner, ConnectionHandler, ConnectionSettings, ConnectionState,
    CHAT_NOT_IN_ROOM_NOTICE, NAME_PROMPT,
};
pub use input::{LineBuffer, LineReader};
pub use listener::ChatServer;
pub use writer::write_loop;
