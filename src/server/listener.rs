//! TCP front door of the chat server.
//!
//! [`ChatServer`] owns the listening socket, the shared [`Directory`] and the
//! per-connection settings. Each accepted socket gets its own task running
//! [`handle_connection`], and a semaphore caps how many run at once.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::connection::{handle_connection, ConnectionSettings};
use crate::chat::Directory;
use crate::config::Config;
use crate::{LoungeError, Result};

/// Shortest pause after a failed accept.
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);

/// Longest pause after repeated failed accepts.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause before the next accept after `failures` consecutive errors.
fn accept_backoff(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(7);
    (ACCEPT_BACKOFF_MIN * factor).min(ACCEPT_BACKOFF_MAX)
}

/// A bound chat server, ready to [`run`](ChatServer::run).
pub struct ChatServer {
    listener: TcpListener,
    slots: Arc<Semaphore>,
    capacity: usize,
    directory: Arc<Directory>,
    settings: Arc<ConnectionSettings>,
}

impl ChatServer {
    /// Bind to `[server]` host and port with a fresh directory holding the
    /// default room.
    pub async fn bind(config: &Config) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await?;

        info!(
            "Chat server listening on {} (max {} connections, default room {})",
            listener.local_addr()?,
            config.server.max_connections,
            config.chat.default_room
        );

        Ok(Self {
            listener,
            slots: Arc::new(Semaphore::new(config.server.max_connections)),
            capacity: config.server.max_connections,
            directory: Arc::new(Directory::with_rooms([config.chat.default_room.clone()])),
            settings: Arc::new(ConnectionSettings::from_config(config)),
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The directory shared by every connection.
    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Connections currently holding a slot.
    pub fn active_connections(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Wait for a free slot.
    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| LoungeError::Io(std::io::Error::other("connection slots closed")))
    }

    /// Accept connections until the task is cancelled.
    ///
    /// A new socket is only accepted once a slot is free, so clients over
    /// the limit wait in the kernel backlog. Failed accepts are retried with
    /// a growing pause.
    pub async fn run(self) -> Result<()> {
        let mut failures = 0u32;

        loop {
            let slot = self.acquire_slot().await?;

            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let pause = accept_backoff(failures);
                    warn!(
                        "Accept failed ({} in a row): {}; retrying in {:?}",
                        failures, e, pause
                    );
                    drop(slot);
                    tokio::time::sleep(pause).await;
                    continue;
                }
            };
            failures = 0;

            debug!(
                "Accepted {} ({}/{} slots in use)",
                peer_addr,
                self.active_connections(),
                self.capacity
            );

            let directory = Arc::clone(&self.directory);
            let settings = Arc::clone(&self.settings);
            tokio::spawn(async move {
                handle_connection(stream, peer_addr, directory, settings).await;
                drop(slot);
            });
        }
    }
}
