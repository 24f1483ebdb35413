//! Tokio task runner for agents
//!
//! One independently timed, indefinitely repeating task per registered
//! agent: run immediately, sleep the agent's interval, repeat. The
//! registration list is resolved once at startup and never hot-reloaded.

use crate::agent::Agent;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct Scheduler {
    agents: Vec<Arc<dyn Agent>>,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            agents: Vec::new(),
            shutdown,
        }
    }

    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        info!(
            "Registered agent {} (every {:?})",
            agent.name(),
            agent.interval()
        );
        self.agents.push(agent);
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Spawn every agent's polling loop. Each loop runs its first cycle
    /// immediately, with no artificial startup delay. A cycle error is caught
    /// at the task boundary, logged, and that agent's own schedule resumes
    /// next interval; other agents are unaffected.
    pub fn start_all(&self) -> Vec<JoinHandle<()>> {
        info!("Starting {} agent(s)", self.agents.len());

        self.agents
            .iter()
            .map(|agent| {
                let agent = agent.clone();
                let cancel = self.shutdown.clone();

                tokio::spawn(async move {
                    info!("Agent {} started", agent.name());
                    loop {
                        let started = Instant::now();
                        match agent.run().await {
                            Ok(()) => debug!(
                                "Agent {} cycle finished in {:?}",
                                agent.name(),
                                started.elapsed()
                            ),
                            Err(e) => {
                                error!("Agent {} cycle failed: {}", agent.name(), e);
                            }
                        }

                        tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("Agent {} stopped", agent.name());
                                break;
                            }
                            _ = tokio::time::sleep(agent.interval()) => {}
                        }
                    }
                })
            })
            .collect()
    }
}
