//! Shared types for herald

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Wire marker used on the notification bus to address every mutual contact
pub const BROADCAST_MARKER: &str = "everyone";

/// What kind of event a notification carries.
///
/// Weather and game alerts are "alert-style": a subscriber with an active
/// mute is skipped entirely for those, instead of having delivery deferred.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Commit,
    Sale,
    GameAlert,
    Weather,
    Price,
    #[default]
    Generic,
}

impl Category {
    /// Parse a category from a bus `type` field (unknown values map to Generic)
    pub fn from_wire(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "commit" => Self::Commit,
            "sale" => Self::Sale,
            "game-alert" => Self::GameAlert,
            "weather" => Self::Weather,
            "price" => Self::Price,
            _ => Self::Generic,
        }
    }

    /// Whether an active mute suppresses this category outright
    pub fn is_alert_style(&self) -> bool {
        matches!(self, Self::Weather | Self::GameAlert)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Sale => write!(f, "sale"),
            Self::GameAlert => write!(f, "game-alert"),
            Self::Weather => write!(f, "weather"),
            Self::Price => write!(f, "price"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// Who a notification is addressed to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recipient {
    /// A single subscriber handle
    Handle(String),
    /// Every contact with a mutual relationship, resolved at delivery time
    Broadcast,
}

impl Recipient {
    /// Parse the `to` field of a bus message
    pub fn from_wire(to: &str) -> Self {
        if to == BROADCAST_MARKER {
            Self::Broadcast
        } else {
            Self::Handle(to.to_string())
        }
    }
}

/// An ephemeral notification on its way to the relay. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub recipient: Recipient,
    pub category: Category,
    pub body: String,
}

impl Notification {
    pub fn new(recipient: Recipient, category: Category, body: impl Into<String>) -> Self {
        Self {
            recipient,
            category,
            body: body.into(),
        }
    }
}

/// A persisted, subscriber-declared, time-boxed opt-out.
///
/// The background sweep flips `active` to false once `expires` has passed;
/// the record itself is kept for inspection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mute {
    pub active: bool,
    pub started: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl Mute {
    /// Create an active mute lasting `hours` from now
    pub fn for_hours(hours: i64) -> Self {
        let now = Utc::now();
        Self {
            active: true,
            started: now,
            expires: now + chrono::Duration::hours(hours),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// A watched (owner, repo) pair for the commit feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct RepoWatch {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepoWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A one-shot price watch on a storefront listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleWatch {
    /// Listing slug, also the lookup key within a subscriber
    pub name: String,
    /// Link included in the notification
    pub url: String,
    /// Notify once the listing price drops to or below this
    pub price: f64,
    /// Apply the 10% member discount before comparing
    pub discount: bool,
}

/// A notification recipient and their watch configuration.
///
/// `handle` is the globally unique key. All collections have set semantics:
/// adding an existing element is a no-op, sale watches upsert by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscriber {
    pub handle: String,
    #[serde(default)]
    pub same_codes: BTreeSet<String>,
    /// Weather severities to receive; empty means all
    #[serde(default)]
    pub severities: BTreeSet<String>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<Mute>,
    #[serde(default)]
    pub repos: BTreeSet<RepoWatch>,
    #[serde(default)]
    pub sale_watches: Vec<SaleWatch>,
}

impl Subscriber {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            same_codes: BTreeSet::new(),
            severities: BTreeSet::new(),
            admin: false,
            mute: None,
            repos: BTreeSet::new(),
            sale_watches: Vec::new(),
        }
    }

    pub fn is_muted(&self, now: DateTime<Utc>) -> bool {
        match &self.mute {
            Some(m) => m.active && !m.is_expired(now),
            None => false,
        }
    }

    /// Upsert a sale watch by name
    pub fn add_sale_watch(&mut self, watch: SaleWatch) {
        if let Some(existing) = self.sale_watches.iter_mut().find(|w| w.name == watch.name) {
            *existing = watch;
        } else {
            self.sale_watches.push(watch);
        }
    }

    /// Whether this subscriber should receive a weather alert with the
    /// given SAME codes and severity
    pub fn matches_alert(&self, same: &[String], severity: &str) -> bool {
        let area_match = same.iter().any(|code| self.same_codes.contains(code));
        let severity_match =
            self.severities.is_empty() || self.severities.contains(&severity.to_lowercase());
        area_match && severity_match
    }
}
