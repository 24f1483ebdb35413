//! Chat transport contract
//!
//! The daemon talks to exactly one chat network through this trait. The
//! concrete adapter lives in herald-channels; tests implement it with
//! recording mocks.

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Relationship between the daemon's account and a contact.
/// Broadcasts resolve to mutual contacts only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Mutual,
    OneWay,
}

/// Events the transport pushes into the daemon's main loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// An inbound chat message addressed to the daemon
    Message { sender: String, body: String },
    /// A contact's presence changed; `busy` is true for do-not-disturb
    Presence { handle: String, busy: bool },
}

/// A chat network adapter
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Connect and start forwarding inbound events to `tx`.
    /// Implementations spawn their own background task and return promptly.
    async fn start(&self, tx: mpsc::Sender<TransportEvent>) -> anyhow::Result<()>;

    /// Send a message to one contact. Failures map to `Error::Delivery`.
    async fn send_message(&self, handle: &str, body: &str) -> Result<()>;

    /// Current contacts and their relationship state. Dynamic, never
    /// persisted; queried at broadcast delivery time.
    async fn list_relationships(&self) -> Result<Vec<(String, Relationship)>>;
}
