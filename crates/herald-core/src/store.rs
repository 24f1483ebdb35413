//! Store contracts
//!
//! The daemon persists three kinds of state: subscribers, seen natural keys
//! per agent namespace, and an audit trail of inbound chat messages. All
//! mutations are idempotent keyed upserts so concurrent agents cannot
//! corrupt anything; no operation spans more than one record.

use crate::error::Result;
use crate::types::{Mute, Subscriber};
use async_trait::async_trait;

/// Persisted subscriber records, keyed by handle
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Point lookup by handle
    async fn get(&self, handle: &str) -> Result<Option<Subscriber>>;

    /// All subscribers
    async fn list(&self) -> Result<Vec<Subscriber>>;

    /// Insert or fully replace a subscriber record
    async fn upsert(&self, sub: &Subscriber) -> Result<()>;

    /// Delete by handle. Returns whether a record existed.
    async fn delete(&self, handle: &str) -> Result<bool>;

    /// Whether the handle belongs to a persisted admin
    async fn is_admin(&self, handle: &str) -> Result<bool>;

    /// Replace a subscriber's mute record. Returns false for an unknown
    /// handle.
    async fn set_mute(&self, handle: &str, mute: Option<Mute>) -> Result<bool>;

    /// Pull one sale watch by name (the one-shot removal the price agent
    /// performs on a match). Returns whether a watch was removed.
    async fn pull_sale_watch(&self, handle: &str, name: &str) -> Result<bool>;
}

/// Append-only record of natural keys already notified, per agent namespace.
///
/// A namespace also tracks whether it has completed at least one poll cycle,
/// which is what the cold-start baseline rule keys off.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Whether this namespace has completed a poll cycle before
    async fn has_history(&self, namespace: &str) -> Result<bool>;

    async fn is_seen(&self, namespace: &str, key: &str) -> Result<bool>;

    /// Record a key as seen (idempotent)
    async fn mark_seen(&self, namespace: &str, key: &str) -> Result<()>;

    /// Record that a poll cycle completed for this namespace (idempotent)
    async fn touch(&self, namespace: &str) -> Result<()>;
}

/// Audit trail of every inbound chat message, stored before dispatch
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record_message(
        &self,
        sender: &str,
        body: &str,
        command: &str,
        args: &[String],
    ) -> Result<()>;
}
