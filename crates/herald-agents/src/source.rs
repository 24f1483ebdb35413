//! Source adapter contracts and record types
//!
//! One trait per external feed. Concrete reqwest implementations live in
//! [`crate::adapters`]; tests substitute canned fakes. Transient source
//! trouble never crosses an agent boundary: [`or_empty`] degrades a failed
//! fetch to zero records with a warning.

use crate::dedup::Record;
use async_trait::async_trait;
use herald_core::error::Result;
use tracing::warn;

/// A commit on a watched repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    pub author: String,
    pub message: String,
    pub url: String,
    pub repo: String,
}

impl Record for Commit {
    fn natural_key(&self) -> String {
        self.sha.clone()
    }

    fn summary(&self) -> String {
        let first_line = self.message.lines().next().unwrap_or("");
        format!(
            "New commit on {} by {}: {}\n{}",
            self.repo, self.author, first_line, self.url
        )
    }
}

/// A free listing on the storefront front page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleItem {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Sale end time as reported by the storefront. Part of the identity:
    /// the same listing going free again later is a new event.
    pub ends_at: String,
}

impl Record for SaleItem {
    fn natural_key(&self) -> String {
        format!("{}:{}", self.id, self.ends_at)
    }

    fn summary(&self) -> String {
        format!("{} is free right now: {}", self.title, self.url)
    }
}

/// A world-state alert offering one of the watched reward items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameAlert {
    pub id: String,
    pub item: String,
}

impl Record for GameAlert {
    fn natural_key(&self) -> String {
        self.id.clone()
    }

    fn summary(&self) -> String {
        format!("Alert up with reward: {}", self.item)
    }
}

/// An active weather alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherAlert {
    pub id: String,
    pub severity: String,
    pub headline: String,
    pub area_desc: String,
    /// SAME geo codes the alert covers, matched against subscriber codes
    pub same: Vec<String>,
}

impl Record for WeatherAlert {
    fn natural_key(&self) -> String {
        self.id.clone()
    }

    fn summary(&self) -> String {
        format!("[{}] {} ({})", self.severity, self.headline, self.area_desc)
    }
}

/// A current price quote for one storefront listing
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub title: String,
    pub price: f64,
}

#[async_trait]
pub trait CommitFeed: Send + Sync {
    /// Recent commits for one repository, newest first
    async fn fetch(&self, owner: &str, repo: &str) -> Result<Vec<Commit>>;
}

#[async_trait]
pub trait SaleFeed: Send + Sync {
    /// Listings currently free on the front page
    async fn fetch(&self) -> Result<Vec<SaleItem>>;
}

#[async_trait]
pub trait GameAlertFeed: Send + Sync {
    /// Active alerts whose reward matches one of `watched` items
    async fn fetch(&self, watched: &[String]) -> Result<Vec<GameAlert>>;
}

#[async_trait]
pub trait WeatherFeed: Send + Sync {
    /// All currently active alerts nationwide
    async fn fetch(&self) -> Result<Vec<WeatherAlert>>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current quote for one listing page, None when the listing is gone
    async fn fetch(&self, url: &str) -> Result<Option<Quote>>;
}

/// Degrade a transient source failure to an empty result
pub fn or_empty<T>(source: &str, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(records) => records,
        Err(e) => {
            warn!("Source {} unavailable, skipping cycle: {}", source, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::error::Error;

    #[test]
    fn test_commit_summary_uses_first_message_line() {
        let commit = Commit {
            sha: "abc123".to_string(),
            author: "bob".to_string(),
            message: "Fix the frobnicator\n\nLong explanation here.".to_string(),
            url: "https://github.com/acme/widgets/commit/abc123".to_string(),
            repo: "acme/widgets".to_string(),
        };
        let summary = commit.summary();
        assert!(summary.contains("Fix the frobnicator"));
        assert!(!summary.contains("Long explanation"));
    }

    #[test]
    fn test_sale_key_includes_end_time() {
        let first = SaleItem {
            id: "widgets".to_string(),
            title: "Widgets".to_string(),
            url: "https://store.example/widgets".to_string(),
            ends_at: "2026-01-01T00:00:00".to_string(),
        };
        let renewed = SaleItem {
            ends_at: "2026-02-01T00:00:00".to_string(),
            ..first.clone()
        };
        assert_ne!(first.natural_key(), renewed.natural_key());
    }

    #[test]
    fn test_or_empty_swallows_transient_errors() {
        let failed: Result<Vec<Commit>> = Err(Error::TransientSource("timed out".into()));
        assert!(or_empty("github", failed).is_empty());

        let ok: Result<Vec<i32>> = Ok(vec![1, 2]);
        assert_eq!(or_empty("github", ok).len(), 2);
    }
}
