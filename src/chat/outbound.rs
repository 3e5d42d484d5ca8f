//! Per-connection outbound queue.
//!
//! Every connection owns a bounded channel drained by its own writer task.
//! Peers deliver into it without blocking; the owning connection may wait
//! for capacity when replying to itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{LoungeError, Result};

/// Receiving half of an outbound queue, consumed by the writer task.
pub type OutboundReceiver = mpsc::Receiver<Arc<String>>;

/// Cloneable handle used to deliver text to one connection.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Arc<String>>,
    dropped: Arc<AtomicU64>,
}

impl Outbound {
    /// Create a handle and the receiver its writer task drains.
    pub fn channel(capacity: usize) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (handle, rx)
    }

    /// Enqueue a line without waiting.
    ///
    /// Returns `false` if the queue is full or closed, and increments the
    /// dropped message counter.
    pub fn try_deliver(&self, line: Arc<String>) -> bool {
        if self.tx.try_send(line).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Enqueue a line, waiting for capacity.
    ///
    /// Fails with [`LoungeError::Disconnected`] once the writer task is gone.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.tx
            .send(Arc::new(text.into()))
            .await
            .map_err(|_| LoungeError::Disconnected)
    }

    /// Reserve a queue slot for `text` without publishing it yet.
    ///
    /// The line is enqueued when the returned [`ReservedLine`] is committed.
    /// Dropping it instead releases the slot.
    pub async fn reserve(&self, text: impl Into<String>) -> Result<ReservedLine> {
        let permit = self
            .tx
            .clone()
            .reserve_owned()
            .await
            .map_err(|_| LoungeError::Disconnected)?;
        Ok(ReservedLine {
            permit,
            line: Arc::new(text.into()),
        })
    }

    /// Total lines dropped for this connection.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A line holding a reserved slot in an outbound queue.
#[derive(Debug)]
pub struct ReservedLine {
    permit: mpsc::OwnedPermit<Arc<String>>,
    line: Arc<String>,
}

impl ReservedLine {
    /// Enqueue the line. Never waits.
    pub fn commit(self) {
        self.permit.send(self.line);
    }
}
