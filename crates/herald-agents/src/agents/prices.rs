//! Price watch agent
//!
//! One page check per (subscriber, sale watch). A hit is one-shot: the
//! watch is pulled from the store before the notification is sent, so a
//! delivery failure cannot cause a second hit next cycle. No seen-item
//! state is involved.

use super::isolate_delivery;
use crate::agent::Agent;
use crate::source::PriceSource;
use async_trait::async_trait;
use herald_core::Result;
use herald_core::store::SubscriberStore;
use herald_core::types::{Category, SaleWatch};
use herald_relay::Relay;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Multiplier applied when the watch opts into the member discount
const MEMBER_DISCOUNT: f64 = 0.90;

pub struct PriceAgent {
    source: Arc<dyn PriceSource>,
    subscribers: Arc<dyn SubscriberStore>,
    relay: Arc<Relay>,
    interval: Duration,
}

impl PriceAgent {
    pub fn new(
        source: Arc<dyn PriceSource>,
        subscribers: Arc<dyn SubscriberStore>,
        relay: Arc<Relay>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            subscribers,
            relay,
            interval,
        }
    }

    fn hit_body(watch: &SaleWatch, title: &str, price: f64) -> String {
        format!(
            "Price watch hit: {title} is {price:.2} (you asked for <= {:.2})\n{}",
            watch.price, watch.url
        )
    }
}

#[async_trait]
impl Agent for PriceAgent {
    fn name(&self) -> &str {
        "prices"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        for sub in self.subscribers.list().await? {
            for watch in &sub.sale_watches {
                let quote = match self.source.fetch(&watch.url).await {
                    Ok(Some(quote)) => quote,
                    Ok(None) => {
                        debug!("Listing {} gone, keeping watch", watch.name);
                        continue;
                    }
                    Err(e) => {
                        warn!("Price check for {} failed: {}", watch.name, e);
                        continue;
                    }
                };

                let effective = if watch.discount {
                    quote.price * MEMBER_DISCOUNT
                } else {
                    quote.price
                };
                if effective > watch.price {
                    continue;
                }

                // Pull first so a crash or send failure cannot re-fire
                if !self
                    .subscribers
                    .pull_sale_watch(&sub.handle, &watch.name)
                    .await?
                {
                    continue;
                }
                isolate_delivery(
                    self.relay
                        .notify(
                            &sub.handle,
                            Category::Price,
                            &Self::hit_body(watch, &quote.title, effective),
                        )
                        .await,
                )?;
            }
        }
        Ok(())
    }
}
