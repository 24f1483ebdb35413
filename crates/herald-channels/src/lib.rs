//! Channel adapters for herald
//!
//! This crate provides the Discord chat transport and the TCP notification
//! bus that sibling processes use to inject notifications.

pub mod bus;
pub mod discord;

pub use bus::{BusMessage, NotificationBus};
pub use discord::DiscordTransport;
