//! Fire-and-forget TCP notification bus
//!
//! External processes connect, write exactly one MessagePack-encoded map
//! (named fields `to`, `msg`, optional `type`), and close. The listener
//! reads until EOF and forwards a decoded notification to the relay. This
//! is an at-most-once contract by design: there is no response, no
//! acknowledgement and no retry, and a sender never learns about a decode
//! failure. Empty or malformed payloads are logged and discarded.

use anyhow::{Context, Result};
use herald_core::types::{Category, Notification, Recipient};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upper bound on a single bus frame; anything larger is cut off and will
/// fail to decode
const MAX_FRAME_BYTES: u64 = 64 * 1024;

/// One message on the bus wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusMessage {
    /// Recipient handle, or the broadcast marker
    pub to: String,
    /// Message text
    pub msg: String,
    /// Optional category; missing or unknown maps to generic
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl BusMessage {
    pub fn into_notification(self) -> Notification {
        let category = self
            .kind
            .as_deref()
            .map(Category::from_wire)
            .unwrap_or_default();
        Notification::new(Recipient::from_wire(&self.to), category, self.msg)
    }
}

/// Encode a bus message as a named-field MessagePack map
pub fn encode(msg: &BusMessage) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(msg).context("Failed to encode bus message")
}

/// Decode one whole bus frame
pub fn decode(buf: &[u8]) -> Result<BusMessage> {
    rmp_serde::from_slice(buf).context("Failed to decode bus message")
}

/// The listening side of the bus
pub struct NotificationBus {
    listener: TcpListener,
}

impl NotificationBus {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("Failed to bind notification bus")?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read bus address")
    }

    /// Accept connections until cancelled, forwarding decoded notifications
    /// to `tx`. Each connection is handled in its own task so a slow writer
    /// never blocks the accept loop.
    pub async fn run(self, tx: mpsc::Sender<Notification>, cancel: CancellationToken) {
        info!(
            "Notification bus listening on {}",
            self.local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<unknown>".to_string())
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Notification bus shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, peer, tx).await;
                            });
                        }
                        Err(e) => {
                            warn!("Bus accept failed: {}", e);
                        }
                    }
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, tx: mpsc::Sender<Notification>) {
    let mut buf = Vec::new();
    if let Err(e) = stream.take(MAX_FRAME_BYTES).read_to_end(&mut buf).await {
        warn!("Bus read from {} failed: {}", peer, e);
        return;
    }

    debug!("Bus frame from {}: {} bytes", peer, buf.len());

    if buf.is_empty() {
        // Likely a port probe or a sender that gave up; nothing to do
        debug!("Discarding empty bus frame from {}", peer);
        return;
    }

    let msg = match decode(&buf) {
        Ok(m) => m,
        Err(e) => {
            // Swallowed by contract: the sender gets no error signal
            warn!("Discarding undecodable bus frame from {}: {}", peer, e);
            return;
        }
    };

    if tx.send(msg.into_notification()).await.is_err() {
        warn!("Relay channel closed, dropping bus message from {}", peer);
    }
}

/// Client side: connect, write one frame, close. Used by sibling processes
/// and by tests.
pub async fn send(addr: impl ToSocketAddrs, msg: &BusMessage) -> Result<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .context("Failed to connect to notification bus")?;
    stream
        .write_all(&encode(msg)?)
        .await
        .context("Failed to write bus frame")?;
    stream
        .shutdown()
        .await
        .context("Failed to close bus connection")?;
    Ok(())
}
