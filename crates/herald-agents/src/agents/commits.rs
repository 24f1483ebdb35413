//! Commit watch agent
//!
//! One fetch per (subscriber, repo) watch. Each watch dedups in its own
//! namespace, so two subscribers watching the same repository are
//! baselined and notified independently.

use super::isolate_delivery;
use crate::agent::Agent;
use crate::dedup::{Record, filter_new};
use crate::source::{CommitFeed, or_empty};
use async_trait::async_trait;
use herald_core::Result;
use herald_core::store::{SeenStore, SubscriberStore};
use herald_core::types::{Category, RepoWatch};
use herald_relay::Relay;
use std::sync::Arc;
use std::time::Duration;

pub struct CommitAgent {
    feed: Arc<dyn CommitFeed>,
    subscribers: Arc<dyn SubscriberStore>,
    seen: Arc<dyn SeenStore>,
    relay: Arc<Relay>,
    interval: Duration,
}

impl CommitAgent {
    pub fn new(
        feed: Arc<dyn CommitFeed>,
        subscribers: Arc<dyn SubscriberStore>,
        seen: Arc<dyn SeenStore>,
        relay: Arc<Relay>,
        interval: Duration,
    ) -> Self {
        Self {
            feed,
            subscribers,
            seen,
            relay,
            interval,
        }
    }

    fn namespace(handle: &str, watch: &RepoWatch) -> String {
        format!("commits:{handle}:{watch}")
    }
}

#[async_trait]
impl Agent for CommitAgent {
    fn name(&self) -> &str {
        "commits"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        for sub in self.subscribers.list().await? {
            for watch in &sub.repos {
                let fetched = or_empty(
                    "github",
                    self.feed.fetch(&watch.owner, &watch.repo).await,
                );
                let namespace = Self::namespace(&sub.handle, watch);
                let fresh = filter_new(self.seen.as_ref(), &namespace, fetched).await?;

                for commit in fresh {
                    isolate_delivery(
                        self.relay
                            .notify(&sub.handle, Category::Commit, &commit.summary())
                            .await,
                    )?;
                }
            }
        }
        Ok(())
    }
}
