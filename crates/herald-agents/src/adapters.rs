//! Concrete reqwest source adapters
//!
//! Each adapter is a thin fetch wrapped around a pure parse function so the
//! parsing can be tested on canned payloads. Every network or parse failure
//! maps to a transient source error; agents degrade those to empty results.

use crate::source::{
    Commit, CommitFeed, GameAlert, GameAlertFeed, PriceSource, Quote, SaleFeed, SaleItem,
    WeatherAlert, WeatherFeed,
};
use async_trait::async_trait;
use herald_core::error::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = "herald/0.1 (notification daemon)";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client")
}

fn transient(context: &str, e: impl std::fmt::Display) -> Error {
    Error::TransientSource(format!("{context}: {e}"))
}

/// Commit listing from the GitHub REST API
pub struct GithubCommitFeed {
    client: Client,
    base_url: String,
}

impl GithubCommitFeed {
    pub fn new() -> Self {
        Self::with_base_url("https://api.github.com")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
        }
    }
}

impl Default for GithubCommitFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommitFeed for GithubCommitFeed {
    async fn fetch(&self, owner: &str, repo: &str) -> Result<Vec<Commit>> {
        let url = format!("{}/repos/{}/{}/commits", self.base_url, owner, repo);
        let body: Value = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transient("github", e))?
            .error_for_status()
            .map_err(|e| transient("github", e))?
            .json()
            .await
            .map_err(|e| transient("github", e))?;

        Ok(parse_commits(&format!("{owner}/{repo}"), &body))
    }
}

/// Extract commits from a GitHub commit-list response. Entries missing a
/// sha are skipped; a missing author account falls back to the git author
/// name.
pub fn parse_commits(repo: &str, body: &Value) -> Vec<Commit> {
    let Some(entries) = body.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let sha = entry.get("sha")?.as_str()?;
            let author = entry
                .pointer("/author/login")
                .and_then(Value::as_str)
                .or_else(|| entry.pointer("/commit/author/name").and_then(Value::as_str))
                .unwrap_or("unknown");
            let message = entry
                .pointer("/commit/message")
                .and_then(Value::as_str)
                .unwrap_or("");
            let url = entry
                .get("html_url")
                .and_then(Value::as_str)
                .unwrap_or("");

            Some(Commit {
                sha: sha.to_string(),
                author: author.to_string(),
                message: message.to_string(),
                url: url.to_string(),
                repo: repo.to_string(),
            })
        })
        .collect()
}

/// Humble storefront scraper: front-page freebies and single-listing quotes.
///
/// The storefront embeds its catalog as a JSON blob inside a script line;
/// both operations locate the line, slice out the JSON and work from there.
pub struct HumbleStorefront {
    client: Client,
    base_url: String,
}

impl HumbleStorefront {
    pub fn new() -> Self {
        Self::with_base_url("https://www.humblebundle.com")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| transient("humble", e))?
            .error_for_status()
            .map_err(|e| transient("humble", e))?
            .text()
            .await
            .map_err(|e| transient("humble", e))
    }
}

impl Default for HumbleStorefront {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SaleFeed for HumbleStorefront {
    async fn fetch(&self) -> Result<Vec<SaleItem>> {
        let page = self.get_text(&format!("{}/store", self.base_url)).await?;
        Ok(parse_storefront(&self.base_url, &page))
    }
}

#[async_trait]
impl PriceSource for HumbleStorefront {
    async fn fetch(&self, url: &str) -> Result<Option<Quote>> {
        let page = self.get_text(url).await?;
        Ok(parse_product(&page))
    }
}

/// Pull the catalog blob out of the front page and keep the listings whose
/// current price includes 0.0. The line is sometimes absent entirely, which
/// reads as no freebies.
pub fn parse_storefront(base_url: &str, page: &str) -> Vec<SaleItem> {
    let Some(line) = page.lines().find(|l| l.contains("page: {\"strings\"")) else {
        return Vec::new();
    };
    let Some(start) = line.find("page: ") else {
        return Vec::new();
    };
    let json = line[start + "page: ".len()..].trim_end().trim_end_matches(',');
    let Ok(parsed) = serde_json::from_str::<Value>(json) else {
        return Vec::new();
    };
    let Some(catalog) = parsed.get("entity_lookup_dict").and_then(Value::as_object) else {
        return Vec::new();
    };

    catalog
        .iter()
        .filter_map(|(id, listing)| {
            let prices = listing.get("current_price")?.as_array()?;
            let free = prices.iter().any(|p| p.as_f64() == Some(0.0));
            if !free {
                return None;
            }

            let title = listing
                .get("human_name")
                .and_then(Value::as_str)
                .unwrap_or(id);
            let slug = listing.get("human_url").and_then(Value::as_str).unwrap_or(id);
            let ends_at = listing
                .get("sale_end")
                .map(Value::to_string)
                .unwrap_or_default();

            Some(SaleItem {
                id: id.clone(),
                title: title.to_string(),
                url: format!("{base_url}/store/{slug}"),
                ends_at,
            })
        })
        .collect()
}

/// Extract the single product record from a listing page. Returns None when
/// the embedded JSON line is missing, which covers delisted pages.
pub fn parse_product(page: &str) -> Option<Quote> {
    let line = page.lines().find(|l| l.contains("products_json"))?;
    let start = line.find("[{")?;
    let json = line[start..].trim_end().trim_end_matches(',');
    let products: Value = serde_json::from_str(json).ok()?;
    let product = products.as_array()?.first()?;

    let title = product.get("human_name")?.as_str()?;
    let price = product
        .get("current_price")?
        .as_array()?
        .first()?
        .as_f64()?;

    Some(Quote {
        title: title.to_string(),
        price,
    })
}

/// Warframe world-state alert feed
pub struct WorldStateFeed {
    client: Client,
    url: String,
}

impl WorldStateFeed {
    pub fn new() -> Self {
        Self::with_url("http://content.warframe.com/dynamic/worldState.php")
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
        }
    }
}

impl Default for WorldStateFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameAlertFeed for WorldStateFeed {
    async fn fetch(&self, watched: &[String]) -> Result<Vec<GameAlert>> {
        // The endpoint serves JSON with a text/html content type, so go
        // through the raw body
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| transient("worldstate", e))?
            .error_for_status()
            .map_err(|e| transient("worldstate", e))?
            .text()
            .await
            .map_err(|e| transient("worldstate", e))?;

        let parsed: Value =
            serde_json::from_str(&body).map_err(|e| transient("worldstate", e))?;
        Ok(parse_world_state(&parsed, watched))
    }
}

/// Walk the alert list and keep alerts whose mission reward mentions one of
/// the watched items. Rewards come as either counted items or plain item
/// paths; credits-only alerts carry neither and are skipped.
pub fn parse_world_state(body: &Value, watched: &[String]) -> Vec<GameAlert> {
    let Some(alerts) = body.get("Alerts").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    for alert in alerts {
        let Some(id) = alert.pointer("/_id/$oid").and_then(Value::as_str) else {
            continue;
        };
        let Some(reward) = alert.pointer("/MissionInfo/missionReward") else {
            continue;
        };

        let mut items: Vec<&str> = Vec::new();
        if let Some(counted) = reward.get("countedItems").and_then(Value::as_array) {
            items.extend(
                counted
                    .iter()
                    .filter_map(|i| i.get("ItemType").and_then(Value::as_str)),
            );
        } else if let Some(plain) = reward.get("items").and_then(Value::as_array) {
            items.extend(plain.iter().filter_map(Value::as_str));
        }

        for item in items {
            if watched.iter().any(|w| item.contains(w.as_str())) {
                results.push(GameAlert {
                    id: id.to_string(),
                    item: item.to_string(),
                });
            }
        }
    }
    results
}

/// Active alerts from the National Weather Service API
pub struct NwsWeatherFeed {
    client: Client,
    url: String,
}

impl NwsWeatherFeed {
    pub fn new() -> Self {
        Self::with_url("https://api.weather.gov/alerts?active=1")
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
        }
    }
}

impl Default for NwsWeatherFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WeatherFeed for NwsWeatherFeed {
    async fn fetch(&self) -> Result<Vec<WeatherAlert>> {
        // The API responds with a GeoJSON content type, so parse from text
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| transient("weather", e))?
            .error_for_status()
            .map_err(|e| transient("weather", e))?
            .text()
            .await
            .map_err(|e| transient("weather", e))?;

        let parsed: Value = serde_json::from_str(&body).map_err(|e| transient("weather", e))?;
        Ok(parse_alerts(&parsed))
    }
}

/// Flatten the GeoJSON feature collection into alert records. Features
/// without an id or SAME geocodes cannot be matched to anyone and are
/// dropped.
pub fn parse_alerts(body: &Value) -> Vec<WeatherAlert> {
    let Some(features) = body.get("features").and_then(Value::as_array) else {
        return Vec::new();
    };

    features
        .iter()
        .filter_map(|feature| {
            let props = feature.get("properties")?;
            let id = feature
                .get("id")
                .and_then(Value::as_str)
                .or_else(|| props.get("id").and_then(Value::as_str))?;
            let same: Vec<String> = props
                .pointer("/geocode/SAME")?
                .as_array()?
                .iter()
                .filter_map(|c| c.as_str().map(str::to_string))
                .collect();
            if same.is_empty() {
                return None;
            }

            Some(WeatherAlert {
                id: id.to_string(),
                severity: props
                    .get("severity")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string(),
                headline: props
                    .get("headline")
                    .and_then(Value::as_str)
                    .unwrap_or("Weather alert")
                    .to_string(),
                area_desc: props
                    .get("areaDesc")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                same,
            })
        })
        .collect()
}
