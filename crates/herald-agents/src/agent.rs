//! The agent contract

use async_trait::async_trait;
use std::time::Duration;

/// One scheduled polling unit.
///
/// `run` performs a full poll cycle: fetch, dedup, fan out. An `Err` means
/// the cycle was aborted (typically the store was unreachable); the
/// scheduler logs it and the agent's own schedule resumes next interval.
/// Source trouble is not an error at this level: agents degrade a failed
/// or timed-out fetch to zero records inside `run`.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Pause between the end of one cycle and the start of the next
    fn interval(&self) -> Duration;

    async fn run(&self) -> herald_core::Result<()>;
}
