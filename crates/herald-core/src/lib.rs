//! herald-core: shared contracts for the herald daemon
//!
//! This crate provides:
//! - The data model: subscribers, watches, notifications, categories
//! - The error taxonomy used across all crates
//! - Store traits for subscribers, seen-item dedup state and the audit log
//! - The chat transport trait that channel adapters implement

pub mod error;
pub mod store;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use store::{AuditStore, SeenStore, SubscriberStore};
pub use transport::{ChatTransport, Relationship, TransportEvent};
pub use types::{Category, Mute, Notification, Recipient, RepoWatch, SaleWatch, Subscriber};
