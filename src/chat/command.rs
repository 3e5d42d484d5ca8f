//! Chat command parser and reply formatting.
//!
//! A line starting with `/` is a command. The first whitespace-delimited
//! token selects the command (case-sensitive); the remaining tokens are
//! positional arguments.

use super::directory::RoomInfo;

/// Prefix that marks a line as a command.
pub const COMMAND_PREFIX: char = '/';

/// Result of parsing a chat input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    /// Blank line (ignored).
    Empty,
    /// Regular chat message.
    Message(String),
    /// Parsed command.
    Command(ChatCommand),
}

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// List all rooms with member counts.
    Rooms,
    /// Join (creating if needed) a room. `None` when the argument is missing.
    Join(Option<String>),
    /// Leave the current room.
    Leave,
    /// List members of the current room.
    Who,
    /// Show help message.
    Help,
    /// Disconnect from the server.
    Quit,
    /// Unrecognized command token (without the prefix).
    Unknown(String),
}

impl ChatCommand {
    /// Get the command name.
    pub fn name(&self) -> &str {
        match self {
            ChatCommand::Rooms => "rooms",
            ChatCommand::Join(_) => "join",
            ChatCommand::Leave => "leave",
            ChatCommand::Who => "who",
            ChatCommand::Help => "help",
            ChatCommand::Quit => "quit",
            ChatCommand::Unknown(cmd) => cmd,
        }
    }
}

impl std::fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatCommand::Join(Some(room)) => write!(f, "/join {room}"),
            other => write!(f, "/{}", other.name()),
        }
    }
}

/// Parse a chat input line into a message or command.
pub fn parse_input(input: &str) -> ChatInput {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return ChatInput::Empty;
    }

    let Some(without_prefix) = trimmed.strip_prefix(COMMAND_PREFIX) else {
        return ChatInput::Message(trimmed.to_string());
    };

    // "/ foo" has an empty command token, which is unknown.
    let (cmd, args) = match without_prefix.find(char::is_whitespace) {
        Some(pos) => (&without_prefix[..pos], &without_prefix[pos..]),
        None => (without_prefix, ""),
    };
    let mut args = args.split_whitespace();

    let command = match cmd {
        "rooms" => ChatCommand::Rooms,
        "join" => ChatCommand::Join(args.next().map(str::to_string)),
        "leave" => ChatCommand::Leave,
        "who" => ChatCommand::Who,
        "help" => ChatCommand::Help,
        "quit" => ChatCommand::Quit,
        _ => ChatCommand::Unknown(cmd.to_string()),
    };

    ChatInput::Command(command)
}

/// Chat command information for help display.
pub struct CommandInfo {
    /// Command syntax.
    pub syntax: &'static str,
    /// Command description.
    pub description: &'static str,
}

/// Get all available command information.
pub fn get_command_help() -> Vec<CommandInfo> {
    vec![
        CommandInfo {
            syntax: "/help",
            description: "Show this help message",
        },
        CommandInfo {
            syntax: "/rooms",
            description: "List all available rooms",
        },
        CommandInfo {
            syntax: "/join <room>",
            description: "Join or create a room",
        },
        CommandInfo {
            syntax: "/leave",
            description: "Leave current room",
        },
        CommandInfo {
            syntax: "/who",
            description: "Show users in current room",
        },
        CommandInfo {
            syntax: "/quit",
            description: "Disconnect from server",
        },
    ]
}

/// Hint appended to unknown-command errors.
pub const HELP_HINT: &str = "Type /help for available commands\n";

/// Format the help message for display.
pub fn format_help() -> String {
    let mut out = String::from("Available Commands:\n==================\n");
    for info in get_command_help() {
        out.push_str(&format!("{:<14} - {}\n", info.syntax, info.description));
    }
    out.push_str("==================\n");
    out.push_str("Type any message to chat with room members\n");
    out
}

/// Format the room list for `/rooms`.
pub fn format_rooms(rooms: &[RoomInfo]) -> String {
    let mut out = String::from("Available Rooms:\n================\n");
    for room in rooms {
        out.push_str(&format!("* {} ({} users)\n", room.name, room.member_count));
    }
    out.push_str("================\n");
    out
}

/// Format member lines, marking the requester's own entry.
pub fn format_members(members: &[String], me: &str) -> String {
    let mut out = String::new();
    for name in members {
        if name == me {
            out.push_str(&format!("* {name} (you)\n"));
        } else {
            out.push_str(&format!("* {name}\n"));
        }
    }
    out
}

/// Format the member list for `/who`.
pub fn format_who(members: &[String], room: &str, me: &str) -> String {
    let rule = "==========================\n";
    format!(
        "Users in room '{}' ({}):\n{rule}{}{rule}",
        room,
        members.len(),
        format_members(members, me)
    )
}
