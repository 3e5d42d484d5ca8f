//! Per-connection state machine.
//!
//! A connection starts in [`ConnectionState::Handshake`], becomes
//! [`ConnectionState::Active`] once a unique name is registered, and ends in
//! [`ConnectionState::Terminated`]. All output for the peer goes through its
//! own outbound queue, drained by a dedicated writer task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::input::LineReader;
use super::writer::write_loop;
use crate::chat::{parse_input, ChatInput, CommandDispatcher, Directory, Flow, Outbound};
use crate::config::Config;
use crate::error::DirectoryError;
use crate::Result;

/// Prompt sent before each name attempt.
pub const NAME_PROMPT: &str = "Enter Username: ";

/// Notice for chat lines sent outside any room.
pub const CHAT_NOT_IN_ROOM_NOTICE: &str =
    "[Info] You are not in any room. Use /join <room> to enter one.\n";

/// Connection state representing the current phase of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Waiting for a unique name.
    #[default]
    Handshake,
    /// Registered and exchanging messages.
    Active,
    /// Closed. No further operations occur.
    Terminated,
}

/// Settings each connection needs from the configuration.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Room every new session is registered into.
    pub default_room: String,
    /// Maximum username length in characters.
    pub max_name_length: usize,
    /// Capacity of the outbound queue.
    pub outbound_queue_capacity: usize,
    /// Maximum accepted line length in bytes.
    pub max_line_length: usize,
}

impl ConnectionSettings {
    /// Extract connection settings from the full configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_room: config.chat.default_room.clone(),
            max_name_length: config.chat.max_name_length,
            outbound_queue_capacity: config.server.outbound_queue_capacity,
            max_line_length: config.server.max_line_length,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Format the welcome banner shown after a successful handshake.
pub fn welcome_banner(room: &str) -> String {
    format!(
        "===============================================================\n\
         |                    TERMINAL CHAT SERVER                    |\n\
         ===============================================================\n\
         Connected to room: {room}\n\
         Type messages or commands (type /help for command list)\n\
         ---------------------------------------------------------------\n"
    )
}

/// Drives one connection from handshake to teardown.
pub struct ConnectionHandler {
    /// Connection identifier used in logs.
    id: Uuid,
    /// Remote peer, if known.
    peer_addr: Option<SocketAddr>,
    directory: Arc<Directory>,
    dispatcher: CommandDispatcher,
    settings: Arc<ConnectionSettings>,
    state: ConnectionState,
    /// Registered name while the session exists in the directory.
    name: Option<String>,
}

impl ConnectionHandler {
    /// Create a handler for a new connection.
    pub fn new(directory: Arc<Directory>, settings: Arc<ConnectionSettings>) -> Self {
        let id = Uuid::new_v4();
        debug!("Created connection handler {}", id);

        Self {
            id,
            peer_addr: None,
            dispatcher: CommandDispatcher::new(Arc::clone(&directory)),
            directory,
            settings,
            state: ConnectionState::Handshake,
            name: None,
        }
    }

    /// Record the remote peer address for logging.
    pub fn with_peer_addr(mut self, peer_addr: SocketAddr) -> Self {
        self.peer_addr = Some(peer_addr);
        self
    }

    /// Get the connection ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the registered name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn set_state(&mut self, state: ConnectionState) {
        debug!(
            "Connection {} state changed: {:?} -> {:?}",
            self.id, self.state, state
        );
        self.state = state;
    }

    /// Run the connection to completion over `stream`.
    ///
    /// Returns once the connection is terminated and every queued line has
    /// been written (or the socket failed).
    pub async fn run<S>(mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound, rx) = Outbound::channel(self.settings.outbound_queue_capacity);
        let writer = tokio::spawn(write_loop(write_half, rx));
        let mut lines = LineReader::new(read_half, self.settings.max_line_length);

        let result = self.drive(&mut lines, &outbound).await;
        self.teardown().await;

        // The writer finishes once the directory and this handler no longer
        // hold the queue.
        drop(outbound);
        match writer.await {
            Ok(Err(e)) => debug!("Connection {} writer ended with error: {}", self.id, e),
            Err(e) => warn!("Connection {} writer task failed: {}", self.id, e),
            Ok(Ok(())) => {}
        }

        result
    }

    async fn drive<R>(&mut self, lines: &mut LineReader<R>, outbound: &Outbound) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let step = match self.state {
                ConnectionState::Handshake => self.handshake_step(lines, outbound).await,
                ConnectionState::Active => self.active_step(lines, outbound).await,
                ConnectionState::Terminated => return Ok(()),
            };

            if let Err(e) = step {
                self.set_state(ConnectionState::Terminated);
                return Err(e);
            }
        }
    }

    /// Read one line from the peer, terminating on EOF or read error.
    async fn next_line<R>(&mut self, lines: &mut LineReader<R>) -> Option<String>
    where
        R: AsyncRead + Unpin,
    {
        match lines.read_line().await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                info!(
                    "Connection {} ({:?}) closed by peer{}",
                    self.id,
                    self.peer_addr,
                    self.name_suffix()
                );
                self.set_state(ConnectionState::Terminated);
                None
            }
            Err(e) => {
                warn!(
                    "Connection {} read error{}: {}",
                    self.id,
                    self.name_suffix(),
                    e
                );
                self.set_state(ConnectionState::Terminated);
                None
            }
        }
    }

    async fn handshake_step<R>(
        &mut self,
        lines: &mut LineReader<R>,
        outbound: &Outbound,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        outbound.send(NAME_PROMPT).await?;
        let Some(line) = self.next_line(lines).await else {
            return Ok(());
        };

        let name = line.trim();
        if name.is_empty() {
            outbound
                .send("Username cannot be empty. Try again.\n")
                .await?;
            return Ok(());
        }
        if name.chars().count() > self.settings.max_name_length {
            let reason = format!(
                "Username must be at most {} characters",
                self.settings.max_name_length
            );
            outbound.send(handshake_error(&reason)).await?;
            return Ok(());
        }

        let settings = Arc::clone(&self.settings);
        let room = &settings.default_room;
        let banner = outbound.reserve(welcome_banner(room)).await?;
        match self
            .directory
            .register_greeted(name, outbound.clone(), room, banner)
            .await
        {
            Ok(_) => {
                info!(
                    "Connection {} ({:?}) registered as {}",
                    self.id, self.peer_addr, name
                );
                self.name = Some(name.to_string());
                self.set_state(ConnectionState::Active);
            }
            Err(e) => {
                debug!("Connection {} handshake rejected: {}", self.id, e);
                outbound.send(handshake_error(&e.to_string())).await?;
            }
        }
        Ok(())
    }

    async fn active_step<R>(&mut self, lines: &mut LineReader<R>, outbound: &Outbound) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let Some(line) = self.next_line(lines).await else {
            return Ok(());
        };
        let Some(name) = self.name.clone() else {
            self.set_state(ConnectionState::Terminated);
            return Ok(());
        };

        match parse_input(&line) {
            ChatInput::Empty => {}
            ChatInput::Message(text) => match self.directory.broadcast(&name, &text).await {
                Ok(delivery) => debug!(
                    "{} broadcast to {} peers ({} dropped)",
                    name, delivery.delivered, delivery.dropped
                ),
                Err(DirectoryError::NotInRoom(_)) => {
                    outbound.send(CHAT_NOT_IN_ROOM_NOTICE).await?;
                }
                Err(e) => {
                    outbound.send(format!("[Error] {e}\n")).await?;
                }
            },
            ChatInput::Command(command) => {
                let dispatch = self.dispatcher.dispatch(&name, &command).await;
                if dispatch.flow == Flow::Quit {
                    // The dispatcher already deregistered the session.
                    self.name = None;
                    self.set_state(ConnectionState::Terminated);
                }
                outbound.send(dispatch.reply).await?;
            }
        }
        Ok(())
    }

    /// Deregister the session if it still exists.
    async fn teardown(&mut self) {
        self.set_state(ConnectionState::Terminated);

        let Some(name) = self.name.take() else {
            return;
        };
        match self.directory.deregister(&name).await {
            Ok(info) => info!(
                "Connection {} for {} closed after {}s",
                self.id,
                name,
                info.connected_secs()
            ),
            Err(e) => debug!("Connection {} teardown: {}", self.id, e),
        }
    }

    fn name_suffix(&self) -> String {
        self.name
            .as_deref()
            .map(|n| format!(" ({n})"))
            .unwrap_or_default()
    }
}

/// Format a rejected handshake attempt.
fn handshake_error(reason: &str) -> String {
    format!("Error: {reason}\nPlease try a different username.\n")
}

/// Handle an accepted TCP connection until it closes.
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    directory: Arc<Directory>,
    settings: Arc<ConnectionSettings>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
    }

    let handler = ConnectionHandler::new(directory, settings).with_peer_addr(peer_addr);
    let id = handler.id();
    info!("Connection {} accepted from {}", id, peer_addr);

    if let Err(e) = handler.run(stream).await {
        debug!("Connection {} ended: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn setup() -> (Arc<Directory>, Arc<ConnectionSettings>) {
        (
            Arc::new(Directory::with_rooms(["general"])),
            Arc::new(ConnectionSettings::default()),
        )
    }

    /// Start a handler over an in-memory stream and return the client side.
    fn connect(
        directory: &Arc<Directory>,
        settings: &Arc<ConnectionSettings>,
    ) -> (DuplexStream, tokio::task::JoinHandle<Result<()>>) {
        let (client, server) = tokio::io::duplex(4096);
        let handler = ConnectionHandler::new(Arc::clone(directory), Arc::clone(settings));
        (client, tokio::spawn(handler.run(server)))
    }

    /// Read until `needle` appears in the accumulated output.
    async fn read_until(client: &mut DuplexStream, needle: &str) -> String {
        let mut out = String::new();
        let mut buf = [0u8; 1024];
        timeout(WAIT, async {
            while !out.contains(needle) {
                let n = client.read(&mut buf).await.unwrap();
                assert!(n > 0, "stream closed before {needle:?}; got {out:?}");
                out.push_str(&String::from_utf8_lossy(&buf[..n]));
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; got {out:?}"));
        out
    }

    #[test]
    fn test_connection_state_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Handshake);
    }

    #[test]
    fn test_welcome_banner_names_room() {
        let banner = welcome_banner("general");
        assert!(banner.contains("TERMINAL CHAT SERVER"));
        assert!(banner.contains("Connected to room: general\n"));
        assert!(banner.contains("/help"));
    }

    #[test]
    fn test_handshake_error_shape() {
        assert_eq!(
            handshake_error("Username 'alice' is already taken"),
            "Error: Username 'alice' is already taken\nPlease try a different username.\n"
        );
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.chat.default_room = "hall".to_string();
        config.server.outbound_queue_capacity = 3;

        let settings = ConnectionSettings::from_config(&config);
        assert_eq!(settings.default_room, "hall");
        assert_eq!(settings.outbound_queue_capacity, 3);
        assert_eq!(settings.max_name_length, 32);
    }

    #[test]
    fn test_new_handler_starts_in_handshake() {
        let (directory, settings) = setup();
        let handler = ConnectionHandler::new(directory, settings);
        assert_eq!(handler.state(), ConnectionState::Handshake);
        assert!(handler.name().is_none());
    }

    #[tokio::test]
    async fn test_handshake_registers_and_welcomes() {
        let (directory, settings) = setup();
        let (mut client, task) = connect(&directory, &settings);

        read_until(&mut client, NAME_PROMPT).await;
        client.write_all(b"alice\r\n").await.unwrap();
        let out = read_until(&mut client, "Connected to room: general").await;
        assert!(out.contains("TERMINAL CHAT SERVER"));
        assert_eq!(directory.snapshot("general").await.unwrap(), vec!["alice"]);

        drop(client);
        timeout(WAIT, task).await.unwrap().unwrap().unwrap();
        assert!(directory.session("alice").await.is_none());
    }

    #[tokio::test]
    async fn test_handshake_reprompts_on_empty_and_long_names() {
        let (directory, settings) = setup();
        let (mut client, _task) = connect(&directory, &settings);

        read_until(&mut client, NAME_PROMPT).await;
        client.write_all(b"   \n").await.unwrap();
        let out = read_until(&mut client, NAME_PROMPT).await;
        assert!(out.contains("Username cannot be empty. Try again.\n"));

        let long = "x".repeat(settings.max_name_length + 1);
        client
            .write_all(format!("{long}\n").as_bytes())
            .await
            .unwrap();
        let out = read_until(&mut client, NAME_PROMPT).await;
        assert!(out.contains("Please try a different username.\n"));
        assert_eq!(directory.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_handshake_name_taken_reprompts() {
        let (directory, settings) = setup();
        let (taken, _rx) = Outbound::channel(4);
        directory.register("alice", taken, "general").await.unwrap();

        let (mut client, _task) = connect(&directory, &settings);
        read_until(&mut client, NAME_PROMPT).await;
        client.write_all(b"alice\n").await.unwrap();
        let out = read_until(&mut client, NAME_PROMPT).await;
        assert!(out.contains("Error: Username 'alice' is already taken\n"));

        client.write_all(b"alice2\n").await.unwrap();
        read_until(&mut client, "Connected to room: general").await;
        assert_eq!(directory.session_count().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_banner_precedes_peer_chat() {
        let (directory, settings) = setup();
        let (bob, _bob_rx) = Outbound::channel(1024);
        directory.register("bob", bob, "general").await.unwrap();

        let chatter = {
            let directory = Arc::clone(&directory);
            tokio::spawn(async move {
                for i in 0..500 {
                    let _ = directory.broadcast("bob", &format!("line {i}")).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let (mut client, _task) = connect(&directory, &settings);
        read_until(&mut client, NAME_PROMPT).await;
        client.write_all(b"alice\n").await.unwrap();
        let out = read_until(&mut client, "TERMINAL CHAT SERVER").await;
        assert!(!out.contains("<bob>"), "chat arrived before the banner: {out:?}");

        chatter.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_with_single_slot_queue() {
        let directory = Arc::new(Directory::with_rooms(["general"]));
        let settings = Arc::new(ConnectionSettings {
            outbound_queue_capacity: 1,
            ..ConnectionSettings::default()
        });
        let (mut client, _task) = connect(&directory, &settings);

        read_until(&mut client, NAME_PROMPT).await;
        client.write_all(b"\nalice\n").await.unwrap();
        let out = read_until(&mut client, "Connected to room: general").await;
        assert!(out.contains("Username cannot be empty. Try again.\n"));
    }

    #[tokio::test]
    async fn test_handshake_missing_default_room() {
        let directory = Arc::new(Directory::new());
        let settings = Arc::new(ConnectionSettings::default());
        let (mut client, _task) = connect(&directory, &settings);

        read_until(&mut client, NAME_PROMPT).await;
        client.write_all(b"alice\n").await.unwrap();
        let out = read_until(&mut client, NAME_PROMPT).await;
        assert!(out.contains("Error: Room 'general' not found\n"));
    }

    #[tokio::test]
    async fn test_chat_outside_room_is_informational() {
        let (directory, settings) = setup();
        let (mut client, _task) = connect(&directory, &settings);

        read_until(&mut client, NAME_PROMPT).await;
        client.write_all(b"alice\n/leave\n").await.unwrap();
        read_until(&mut client, "--- Left room: general ---").await;

        client.write_all(b"\nhello?\n").await.unwrap();
        read_until(&mut client, CHAT_NOT_IN_ROOM_NOTICE).await;
        assert!(directory.session("alice").await.is_some());
    }

    #[tokio::test]
    async fn test_quit_sends_farewell_and_closes() {
        let (directory, settings) = setup();
        let (mut client, task) = connect(&directory, &settings);

        read_until(&mut client, NAME_PROMPT).await;
        client.write_all(b"alice\n/quit\n").await.unwrap();

        let mut out = String::new();
        timeout(WAIT, client.read_to_string(&mut out))
            .await
            .unwrap()
            .unwrap();
        assert!(out.ends_with("|  Thanks for chat! |\n+-------------------+\n"));

        timeout(WAIT, task).await.unwrap().unwrap().unwrap();
        assert!(directory.session("alice").await.is_none());
    }

    #[tokio::test]
    async fn test_eof_during_handshake_terminates() {
        let (directory, settings) = setup();
        let (mut client, task) = connect(&directory, &settings);

        read_until(&mut client, NAME_PROMPT).await;
        drop(client);

        timeout(WAIT, task).await.unwrap().unwrap().unwrap();
        assert_eq!(directory.session_count().await, 0);
    }
}
