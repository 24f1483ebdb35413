//! Shared fakes for agent tests: a transport that records sends and
//! scriptable in-memory feeds.

use crate::source::{
    Commit, CommitFeed, GameAlert, GameAlertFeed, PriceSource, Quote, SaleFeed, SaleItem,
    WeatherAlert, WeatherFeed,
};
use async_trait::async_trait;
use herald_core::error::{Error, Result};
use herald_core::transport::{ChatTransport, Relationship, TransportEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};

/// Transport that records every send
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    contacts: Vec<(String, Relationship)>,
}

impl RecordingTransport {
    pub fn with_contacts(contacts: Vec<(String, Relationship)>) -> Self {
        Self {
            contacts,
            ..Default::default()
        }
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn start(&self, _tx: mpsc::Sender<TransportEvent>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_message(&self, handle: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .await
            .push((handle.to_string(), body.to_string()));
        Ok(())
    }

    async fn list_relationships(&self) -> Result<Vec<(String, Relationship)>> {
        Ok(self.contacts.clone())
    }
}

fn down() -> Error {
    Error::TransientSource("feed down".to_string())
}

/// Feed whose contents tests replace between poll cycles
#[derive(Default)]
pub struct StaticCommitFeed {
    records: Mutex<Vec<Commit>>,
    fail: AtomicBool,
}

impl StaticCommitFeed {
    pub async fn set(&self, records: Vec<Commit>) {
        *self.records.lock().await = records;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommitFeed for StaticCommitFeed {
    async fn fetch(&self, owner: &str, repo: &str) -> Result<Vec<Commit>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(down());
        }
        let label = format!("{owner}/{repo}");
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|c| c.repo == label)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct StaticSaleFeed {
    records: Mutex<Vec<SaleItem>>,
}

impl StaticSaleFeed {
    pub async fn set(&self, records: Vec<SaleItem>) {
        *self.records.lock().await = records;
    }
}

#[async_trait]
impl SaleFeed for StaticSaleFeed {
    async fn fetch(&self) -> Result<Vec<SaleItem>> {
        Ok(self.records.lock().await.clone())
    }
}

#[derive(Default)]
pub struct StaticGameAlertFeed {
    records: Mutex<Vec<GameAlert>>,
}

impl StaticGameAlertFeed {
    pub async fn set(&self, records: Vec<GameAlert>) {
        *self.records.lock().await = records;
    }
}

#[async_trait]
impl GameAlertFeed for StaticGameAlertFeed {
    async fn fetch(&self, _watched: &[String]) -> Result<Vec<GameAlert>> {
        Ok(self.records.lock().await.clone())
    }
}

#[derive(Default)]
pub struct StaticWeatherFeed {
    records: Mutex<Vec<WeatherAlert>>,
}

impl StaticWeatherFeed {
    pub async fn set(&self, records: Vec<WeatherAlert>) {
        *self.records.lock().await = records;
    }
}

#[async_trait]
impl WeatherFeed for StaticWeatherFeed {
    async fn fetch(&self) -> Result<Vec<WeatherAlert>> {
        Ok(self.records.lock().await.clone())
    }
}

/// Price source keyed by listing url
#[derive(Default)]
pub struct StaticPriceSource {
    quotes: Mutex<HashMap<String, Quote>>,
}

impl StaticPriceSource {
    pub async fn set(&self, url: &str, quote: Quote) {
        self.quotes.lock().await.insert(url.to_string(), quote);
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn fetch(&self, url: &str) -> Result<Option<Quote>> {
        Ok(self.quotes.lock().await.get(url).cloned())
    }
}

pub fn commit(sha: &str, repo: &str) -> Commit {
    Commit {
        sha: sha.to_string(),
        author: "someone".to_string(),
        message: format!("commit {sha}"),
        url: format!("https://github.com/{repo}/commit/{sha}"),
        repo: repo.to_string(),
    }
}
