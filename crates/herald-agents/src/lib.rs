//! Feed agents and the polling scheduler
//!
//! An agent pairs one source adapter with a poll interval, the uniform
//! dedup policy and a fan-out rule. The scheduler runs every registered
//! agent forever on its own timer; one slow or failing agent never delays
//! another.

pub mod adapters;
pub mod agent;
pub mod agents;
pub mod dedup;
pub mod scheduler;
pub mod source;

pub use agent::Agent;
pub use agents::{
    alerts::GameAlertAgent, commits::CommitAgent, prices::PriceAgent, sales::SalesAgent,
    weather::WeatherAgent,
};
pub use dedup::{Record, filter_new};
pub use scheduler::Scheduler;

#[cfg(test)]
pub(crate) mod testutil;
