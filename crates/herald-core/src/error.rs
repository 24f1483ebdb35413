//! Error taxonomy shared across the herald crates
//!
//! Variants are matched structurally; nothing in the codebase branches on
//! an error's message text. Only the user-facing variants ever reach a chat
//! reply; the operational ones are logged and the loop that hit them keeps
//! running.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A source fetch failed, timed out or returned garbage.
    /// Degrades to an empty result for that cycle.
    #[error("source fetch failed: {0}")]
    TransientSource(String),

    /// The persistence layer is unreachable or rejected an operation.
    /// Aborts the current cycle; the schedule retries next interval.
    #[error("store operation failed: {0}")]
    Store(String),

    /// One recipient's send failed. Isolated: other recipients and already
    /// recorded dedup state are unaffected.
    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },

    /// A command was invoked with bad arguments. The payload is the usage
    /// text shown to the caller.
    #[error("{0}")]
    Usage(String),

    /// A non-admin invoked an admin command.
    #[error("Invalid permissions for that command.")]
    Permission,

    /// A handler-raised domain failure whose message goes to the caller
    /// verbatim.
    #[error("{0}")]
    Domain(String),
}

impl Error {
    /// Whether this error's message may be shown to a chat user
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::Usage(_) | Self::Permission | Self::Domain(_))
    }
}
