//! Writer task draining a connection's outbound queue into its socket.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::chat::OutboundReceiver;

/// Write every queued line to `writer` until all senders are dropped.
///
/// The write half is shut down once the queue closes, so the peer sees EOF
/// after the last queued line. A write failure ends the task, which closes
/// the queue for every remaining sender.
pub async fn write_loop<W>(mut writer: W, mut rx: OutboundReceiver) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!("Write failed, closing outbound queue: {}", e);
            rx.close();
            return Err(e);
        }
        // Flush once the burst of queued lines has been written.
        if rx.is_empty() {
            writer.flush().await?;
        }
    }

    writer.flush().await?;
    writer.shutdown().await
}
