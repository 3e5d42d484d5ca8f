//! Test helpers for E2E tests.
//!
//! Provides TestClient, TestServer, and helper functions for E2E testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use lounge::config::Config;
use lounge::server::NAME_PROMPT;
use lounge::{ChatServer, Directory};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Last line of the welcome banner.
pub const BANNER_END: &str =
    "(type /help for command list)\n---------------------------------------------------------------\n";

/// A chat server running on an ephemeral loopback port.
pub struct TestServer {
    addr: SocketAddr,
    directory: Arc<Directory>,
}

impl TestServer {
    /// Start a server with the default configuration.
    pub async fn start() -> Self {
        Self::start_with(Config::default()).await
    }

    /// Start a server with `config`, overriding the bind address.
    pub async fn start_with(mut config: Config) -> Self {
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;

        let server = ChatServer::bind(&config).await.expect("bind test server");
        let addr = server.local_addr().expect("local addr");
        let directory = Arc::clone(server.directory());
        tokio::spawn(server.run());

        Self { addr, directory }
    }

    /// Get the address clients connect to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the server's directory.
    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Connect a client and complete the handshake as `name`.
    pub async fn login(&self, name: &str) -> TestClient {
        let mut client = TestClient::connect(self.addr).await.expect("connect");
        client.recv_until(NAME_PROMPT).await.expect("prompt");
        client.send_line(name).await.expect("send name");
        client.recv_until(BANNER_END).await.expect("welcome banner");
        client
    }
}

/// Test client for connecting to the chat server.
pub struct TestClient {
    stream: TcpStream,
    /// Received text not yet returned to the test.
    pending: String,
}

impl TestClient {
    /// Connect to the server at the given address.
    pub async fn connect(addr: SocketAddr) -> Result<Self, std::io::Error> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            pending: String::new(),
        })
    }

    /// Send raw bytes to the server.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<(), std::io::Error> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Send a line (with LF) to the server.
    pub async fn send_line(&mut self, line: &str) -> Result<(), std::io::Error> {
        self.send_raw(format!("{line}\n").as_bytes()).await
    }

    /// Receive until `needle` has been seen.
    ///
    /// Returns everything up to and including the needle; anything after it
    /// stays buffered for the next call.
    pub async fn recv_until(&mut self, needle: &str) -> Result<String, std::io::Error> {
        self.recv_until_timeout(needle, DEFAULT_TIMEOUT).await
    }

    /// Receive until `needle` has been seen, with a custom timeout.
    pub async fn recv_until_timeout(
        &mut self,
        needle: &str,
        duration: Duration,
    ) -> Result<String, std::io::Error> {
        match timeout(duration, self.fill_until(&[needle])).await {
            Ok(result) => result.map(|(text, _)| text),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("timed out waiting for {needle:?}; got {:?}", self.pending),
            )),
        }
    }

    /// Receive until the first of `needles` has been seen.
    ///
    /// Returns the received text and the index of the needle that matched.
    pub async fn recv_until_any(
        &mut self,
        needles: &[&str],
    ) -> Result<(String, usize), std::io::Error> {
        match timeout(DEFAULT_TIMEOUT, self.fill_until(needles)).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("timed out waiting for {needles:?}; got {:?}", self.pending),
            )),
        }
    }

    async fn fill_until(&mut self, needles: &[&str]) -> Result<(String, usize), std::io::Error> {
        let mut buf = [0u8; 1024];

        loop {
            let first = needles
                .iter()
                .enumerate()
                .filter_map(|(i, needle)| self.pending.find(needle).map(|pos| (pos, i)))
                .min();
            if let Some((pos, i)) = first {
                let rest = self.pending.split_off(pos + needles[i].len());
                return Ok((std::mem::replace(&mut self.pending, rest), i));
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("connection closed before {needles:?}; got {:?}", self.pending),
                ));
            }
            self.pending.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    }

    /// Read everything until the server closes the connection.
    pub async fn recv_to_end(&mut self) -> Result<String, std::io::Error> {
        let mut rest = String::new();
        timeout(DEFAULT_TIMEOUT, self.stream.read_to_string(&mut rest))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"))??;
        Ok(std::mem::take(&mut self.pending) + &rest)
    }

    /// Assert that nothing arrives within `duration`.
    pub async fn expect_silence(&mut self, duration: Duration) {
        assert!(
            self.pending.is_empty(),
            "unexpected buffered output: {:?}",
            self.pending
        );
        let mut buf = [0u8; 256];
        if let Ok(Ok(n)) = timeout(duration, self.stream.read(&mut buf)).await {
            assert_eq!(
                n,
                0,
                "unexpected output: {:?}",
                String::from_utf8_lossy(&buf[..n])
            );
        }
    }
}
