//! Weather alert agent
//!
//! One nationwide poll; fan-out is per subscriber predicate: SAME code
//! overlap plus the subscriber's severity filter (empty filter means every
//! severity). The relay's mute check then drops muted subscribers.

use super::isolate_delivery;
use crate::agent::Agent;
use crate::dedup::{Record, filter_new};
use crate::source::{WeatherFeed, or_empty};
use async_trait::async_trait;
use herald_core::Result;
use herald_core::store::{SeenStore, SubscriberStore};
use herald_core::types::Category;
use herald_relay::Relay;
use std::sync::Arc;
use std::time::Duration;

const NAMESPACE: &str = "weather";

pub struct WeatherAgent {
    feed: Arc<dyn WeatherFeed>,
    subscribers: Arc<dyn SubscriberStore>,
    seen: Arc<dyn SeenStore>,
    relay: Arc<Relay>,
    interval: Duration,
}

impl WeatherAgent {
    pub fn new(
        feed: Arc<dyn WeatherFeed>,
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
}

#[async_trait]
impl Agent for WeatherAgent {
    fn name(&self) -> &str {
        "weather"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<()> {
        let fetched = or_empty("weather", self.feed.fetch().await);
        let fresh = filter_new(self.seen.as_ref(), NAMESPACE, fetched).await?;
        if fresh.is_empty() {
            return Ok(());
        }

        let subscribers = self.subscribers.list().await?;
        for alert in &fresh {
            for sub in &subscribers {
                if !sub.matches_alert(&alert.same, &alert.severity) {
                    continue;
                }
                isolate_delivery(
                    self.relay
                        .notify(&sub.handle, Category::Weather, &alert.summary())
                        .await,
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::WeatherAlert;
    use crate::testutil::{RecordingTransport, StaticWeatherFeed};
    use herald_core::types::{Mute, Subscriber};
    use herald_store::SqliteStore;

    fn alert(id: &str, severity: &str, same: &[&str]) -> WeatherAlert {
        WeatherAlert {
            id: id.to_string(),
            severity: severity.to_string(),
            headline: format!("Alert {id}"),
            area_desc: "Some County".to_string(),
            same: same.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn fixture() -> (
        WeatherAgent,
        Arc<StaticWeatherFeed>,
        Arc<RecordingTransport>,
        Arc<SqliteStore>,
    ) {
        let feed = Arc::new(StaticWeatherFeed::default());
        let transport = Arc::new(RecordingTransport::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let relay = Arc::new(Relay::new(transport.clone(), store.clone()));
        let agent = WeatherAgent::new(
            feed.clone(),
            store.clone(),
            store.clone(),
            relay,
            Duration::from_secs(60),
        );
        (agent, feed, transport, store)
    }

    async fn subscriber(store: &SqliteStore, handle: &str, codes: &[&str], severities: &[&str]) {
        let mut sub = Subscriber::new(handle);
        sub.same_codes = codes.iter().map(|c| c.to_string()).collect();
        sub.severities = severities.iter().map(|s| s.to_string()).collect();
        store.upsert(&sub).await.unwrap();
    }

    #[tokio::test]
    async fn test_fan_out_by_same_code_and_severity() {
        let (agent, feed, transport, store) = fixture();
        subscriber(&store, "alice", &["029095"], &[]).await;
        subscriber(&store, "bob", &["029095"], &["extreme"]).await;
        subscriber(&store, "carol", &["012345"], &[]).await;

        feed.set(vec![]).await;
        agent.run().await.unwrap();

        feed.set(vec![alert("a1", "Severe", &["029095", "029101"])])
            .await;
        agent.run().await.unwrap();

        // alice matches; bob's severity filter excludes Severe; carol is
        // in another area
        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "alice");
        assert!(sent[0].1.contains("Severe"));
    }

    #[tokio::test]
    async fn test_muted_subscriber_never_hears_about_weather() {
        let (agent, feed, transport, store) = fixture();
        subscriber(&store, "alice", &["029095"], &[]).await;

        let mut alice = store.get("alice").await.unwrap().unwrap();
        alice.mute = Some(Mute::for_hours(8));
        store.upsert(&alice).await.unwrap();

        feed.set(vec![]).await;
        agent.run().await.unwrap();
        feed.set(vec![alert("a1", "Extreme", &["029095"])]).await;
        agent.run().await.unwrap();

        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_alert_seen_once_even_when_nobody_matches() {
        let (agent, feed, transport, store) = fixture();

        feed.set(vec![]).await;
        agent.run().await.unwrap();
        feed.set(vec![alert("a1", "Severe", &["029095"])]).await;
        agent.run().await.unwrap();
        assert!(transport.sent().await.is_empty());

        // A subscriber arriving later does not get notified for an alert
        // the daemon already processed
        subscriber(&store, "alice", &["029095"], &[]).await;
        agent.run().await.unwrap();
        assert!(transport.sent().await.is_empty());
    }
}
