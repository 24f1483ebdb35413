//! Notification relay for herald
//!
//! The relay owns delivery policy: broadcast resolution against the chat
//! roster, the busy tracker that defers messages for do-not-disturb
//! recipients, and the mute check for alert-style categories. The mute
//! sweep task that expires persisted mutes also lives here.

pub mod presence;
pub mod relay;
pub mod sweep;

pub use presence::PresenceTracker;
pub use relay::Relay;
pub use sweep::spawn_mute_sweep;
