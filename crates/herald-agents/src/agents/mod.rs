//! The concrete agents
//!
//! Commits and prices are parameterized per subscriber watch; sales and
//! game alerts poll once globally and broadcast; weather polls once
//! globally and fans out by subscriber predicate.

pub mod alerts;
pub mod commits;
pub mod prices;
pub mod sales;
pub mod weather;

use herald_core::error::{Error, Result};
use tracing::warn;

/// Delivery failures are isolated per target; anything else aborts the
/// cycle so the scheduler logs it and retries next interval.
fn isolate_delivery(result: Result<()>) -> Result<()> {
    match result {
        Err(Error::Delivery { recipient, reason }) => {
            warn!("Dropped notification for {}: {}", recipient, reason);
            Ok(())
        }
        other => other,
    }
}
