//! Chat rooms and the lines fanned out to their members.

use std::collections::BTreeSet;

/// Type of chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Regular chat message.
    Chat,
    /// User joined notification.
    Join,
    /// User left notification.
    Leave,
    /// User quit the server.
    Disconnect,
}

impl MessageType {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Chat => "chat",
            MessageType::Join => "join",
            MessageType::Leave => "leave",
            MessageType::Disconnect => "disconnect",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message delivered to room members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Name of the session the message is about.
    pub sender_name: String,
    /// Message type.
    pub message_type: MessageType,
    /// Message content (empty for notifications).
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message.
    pub fn chat(sender_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            message_type: MessageType::Chat,
            content: content.into(),
        }
    }

    /// Create a join notification.
    pub fn join(sender_name: impl Into<String>) -> Self {
        Self::notice(sender_name, MessageType::Join)
    }

    /// Create a leave notification.
    pub fn leave(sender_name: impl Into<String>) -> Self {
        Self::notice(sender_name, MessageType::Leave)
    }

    /// Create a disconnect notification.
    pub fn disconnect(sender_name: impl Into<String>) -> Self {
        Self::notice(sender_name, MessageType::Disconnect)
    }

    fn notice(sender_name: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            sender_name: sender_name.into(),
            message_type,
            content: String::new(),
        }
    }

    /// Format the message as a wire line, including the trailing newline.
    pub fn format(&self) -> String {
        match self.message_type {
            MessageType::Chat => format!("<{}> {}\n", self.sender_name, self.content),
            MessageType::Join => format!("*** {} joined the room ***\n", self.sender_name),
            MessageType::Leave => format!("*** {} left the room ***\n", self.sender_name),
            MessageType::Disconnect => format!("*** {} disconnected ***\n", self.sender_name),
        }
    }
}

/// A named set of member sessions.
///
/// Rooms are owned by the [`Directory`](super::Directory) and only mutated
/// through it.
#[derive(Debug, Clone)]
pub struct Room {
    /// Room name (unique key).
    name: String,
    /// Member session names.
    members: BTreeSet<String>,
}

impl Room {
    /// Create a new empty room.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeSet::new(),
        }
    }

    /// Get the room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Iterate member names in name order.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    /// Check if a session is a member.
    pub fn contains(&self, session_name: &str) -> bool {
        self.members.contains(session_name)
    }

    /// Add a member. Returns false if it was already present.
    pub(crate) fn insert(&mut self, session_name: &str) -> bool {
        self.members.insert(session_name.to_string())
    }

    /// Remove a member. Returns false if it was not present.
    pub(crate) fn remove(&mut self, session_name: &str) -> bool {
        self.members.remove(session_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_as_str() {
        assert_eq!(MessageType::Chat.as_str(), "chat");
        assert_eq!(MessageType::Join.as_str(), "join");
        assert_eq!(MessageType::Leave.as_str(), "leave");
        assert_eq!(MessageType::Disconnect.to_string(), "disconnect");
    }

    #[test]
    fn test_chat_message_format() {
        let msg = ChatMessage::chat("alice", "hello");
        assert_eq!(msg.message_type, MessageType::Chat);
        assert_eq!(msg.format(), "<alice> hello\n");
    }

    #[test]
    fn test_notification_formats() {
        assert_eq!(
            ChatMessage::join("bob").format(),
            "*** bob joined the room ***\n"
        );
        assert_eq!(
            ChatMessage::leave("bob").format(),
            "*** bob left the room ***\n"
        );
        assert_eq!(
            ChatMessage::disconnect("bob").format(),
            "*** bob disconnected ***\n"
        );
    }

    #[test]
    fn test_room_membership() {
        let mut room = Room::new("general");
        assert_eq!(room.name(), "general");
        assert_eq!(room.member_count(), 0);

        assert!(room.insert("bob"));
        assert!(room.insert("alice"));
        assert!(!room.insert("alice"));
        assert_eq!(room.member_count(), 2);
        assert!(room.contains("alice"));

        let names: Vec<&str> = room.members().collect();
        assert_eq!(names, vec!["alice", "bob"]);

        assert!(room.remove("alice"));
        assert!(!room.remove("alice"));
        assert!(!room.contains("alice"));
        assert_eq!(room.member_count(), 1);
    }
}
