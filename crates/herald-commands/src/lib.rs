//! Chat command surface for herald
//!
//! Inbound direct messages are split into a command word and arguments,
//! audited, permission-checked and routed to a handler. Every handler
//! failure a user can cause comes back as a chat reply; only operational
//! failures (store, transport) escape to the caller.

pub mod convert;
pub mod dispatcher;
pub mod handlers;
pub mod registration;
pub mod solve;

pub use dispatcher::{Command, CommandContext, Dispatcher};
