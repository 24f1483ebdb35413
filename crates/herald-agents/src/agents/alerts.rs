//! Game alert agent
//!
//! Polls the world-state feed for alerts rewarding one of the configured
//! items and broadcasts each new one. Alert-style: the relay skips muted
//! subscribers outright instead of queueing for them.

use crate::agent::Agent;
use crate::dedup::{Record, filter_new};
use crate::source::{GameAlertFeed, or_empty};
use async_trait::async_trait;
use herald_core::Result;
use herald_core::store::SeenStore;
use herald_core::types::{Category, Notification, Recipient};
use herald_relay::Relay;
use std::sync::Arc;
use std::time::Duration;

const NAMESPACE: &str = "game-alerts";

pub struct GameAlertAgent {
    feed: Arc<dyn GameAlertFeed>,
    /// Item names worth broadcasting about, from config
    watched: Vec<String>,
    seen: Arc<dyn SeenStore>,
    relay: Arc<Relay>,
    interval: Duration,
}

impl GameAlertAgent {
    pub fn new(
        feed: Arc<dyn GameAlertFeed>,
        watched: Vec<String>,
        seen: Arc<dyn SeenStore>,
        relay: Arc<Relay>,
        interval: Duration,
    ) -> Self {
        Self {
            feed,
            watched,
            seen,
            relay,
            interval,
        }
    }
}

#[async_trait]
impl Agent for GameAlertAgent {
    fn name(&self) -> &str {
        "game-alerts"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let fetched = or_empty("worldstate", self.feed.fetch(&self.watched).await);
        let fresh = filter_new(self.seen.as_ref(), NAMESPACE, fetched).await?;

        for alert in fresh {
            self.relay
                .deliver(&Notification::new(
                    Recipient::Broadcast,
                    Category::GameAlert,
                    alert.summary(),
                ))
                .await;
        }
        Ok(())
    }
}
