//! Lounge - a multi-room chat server
//!
//! Clients connect over TCP, pick a unique name, and exchange
//! newline-delimited text with the other members of their room.

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;

pub use chat::{CommandDispatcher, Directory, Outbound};
pub use config::Config;
pub use error::{DirectoryError, LoungeError, Result};
pub use server::{handle_connection, ChatServer, ConnectionHandler, ConnectionSettings};
