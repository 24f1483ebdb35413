//! Storefront freebie agent
//!
//! One global poll; every new freebie is broadcast to all mutual contacts.
//! The dedup key includes the sale end time, so a listing that goes free
//! again in a later promotion notifies again.

use crate::agent::Agent;
use crate::dedup::{Record, filter_new};
use crate::source::{SaleFeed, or_empty};
use async_trait::async_trait;
use herald_core::Result;
use herald_core::store::SeenStore;
use herald_core::types::{Category, Notification, Recipient};
use herald_relay::Relay;
use std::sync::Arc;
use std::time::Duration;

const NAMESPACE: &str = "sales";

pub struct SalesAgent {
    feed: Arc<dyn SaleFeed>,
    seen: Arc<dyn SeenStore>,
    relay: Arc<Relay>,
    interval: Duration,
}

impl SalesAgent {
    pub fn new(
        feed: Arc<dyn SaleFeed>,
        seen: Arc<dyn SeenStore>,
        relay: Arc<Relay>,
        interval: Duration,
    ) -> Self {
        Self {
            feed,
            seen,
            relay,
            interval,
        }
    }
}

#[async_trait]
impl Agent for SalesAgent {
    fn name(&self) -> &str {
        "sales"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let fetched = or_empty("humble", self.feed.fetch().await);
        let fresh = filter_new(self.seen.as_ref(), NAMESPACE, fetched).await?;

        for item in fresh {
            self.relay
                .deliver(&Notification::new(
                    Recipient::Broadcast,
                    Category::Sale,
                    item.summary(),
                ))
                .await;
        }
        Ok(())
    }
}
