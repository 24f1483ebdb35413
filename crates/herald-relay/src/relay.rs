//! Delivery relay
//!
//! All notifications, whether produced by an agent cycle or injected over
//! the bus, pass through [`Relay`]. It resolves broadcasts, enforces the
//! mute policy for alert-style categories, and defers delivery for busy
//! recipients. Every target delivery is an independent best-effort
//! attempt; one failure never blocks or retries the rest.

use chrono::Utc;
use herald_core::error::Result;
use herald_core::store::SubscriberStore;
use herald_core::transport::{ChatTransport, Relationship};
use herald_core::types::{Category, Notification, Recipient};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::presence::PresenceTracker;

pub struct Relay {
    transport: Arc<dyn ChatTransport>,
    subscribers: Arc<dyn SubscriberStore>,
    presence: Mutex<PresenceTracker>,
}

impl Relay {
    pub fn new(transport: Arc<dyn ChatTransport>, subscribers: Arc<dyn SubscriberStore>) -> Self {
        Self {
            transport,
            subscribers,
            presence: Mutex::new(PresenceTracker::new()),
        }
    }

    /// Deliver a notification to its recipient or, for broadcasts, to every
    /// mutual contact known to the transport at this moment.
    pub async fn deliver(&self, notification: &Notification) {
        match &notification.recipient {
            Recipient::Handle(handle) => {
                if let Err(e) = self
                    .notify(handle, notification.category, &notification.body)
                    .await
                {
                    warn!("Delivery failed: {}", e);
                }
            }
            Recipient::Broadcast => {
                let contacts = match self.transport.list_relationships().await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("Broadcast aborted, roster unavailable: {}", e);
                        return;
                    }
                };

                for (handle, relationship) in contacts {
                    if relationship != Relationship::Mutual {
                        continue;
                    }
                    if let Err(e) = self
                        .notify(&handle, notification.category, &notification.body)
                        .await
                    {
                        // Isolated per target
                        warn!("Broadcast delivery failed: {}", e);
                    }
                }
            }
        }
    }

    /// Deliver one body to one recipient, applying mute and busy policy.
    ///
    /// Mute on an alert-style category means skip entirely (no queueing);
    /// busy means overwrite the pending slot for this category and deliver
    /// nothing now.
    pub async fn notify(&self, handle: &str, category: Category, body: &str) -> Result<()> {
        if category.is_alert_style() && self.is_muted(handle).await? {
            debug!("Skipping {} notification to muted subscriber {}", category, handle);
            return Ok(());
        }

        {
            let mut presence = self.presence.lock().await;
            if presence.is_busy(handle) {
                debug!("{} is busy, queueing {} notification", handle, category);
                presence.queue(handle, category, body.to_string());
                return Ok(());
            }
        }

        self.transport.send_message(handle, body).await
    }

    async fn is_muted(&self, handle: &str) -> Result<bool> {
        Ok(self
            .subscribers
            .get(handle)
            .await?
            .map(|sub| sub.is_muted(Utc::now()))
            .unwrap_or(false))
    }

    /// Apply a presence change. The busy→idle transition flushes one
    /// summary message per queued category.
    ///
    /// Mute is re-checked at flush time: an alert-style body queued before
    /// the subscriber muted is dropped, not delivered late. Non-alert
    /// bodies flush regardless of mute, matching [`Relay::notify`].
    pub async fn set_busy(&self, handle: &str, busy: bool) {
        if busy {
            self.presence.lock().await.mark_busy(handle);
            debug!("{} marked busy", handle);
            return;
        }

        let flushed = {
            let mut presence = self.presence.lock().await;
            presence.clear_busy(handle)
        };

        if flushed.is_empty() {
            return;
        }

        info!("Flushing {} queued notification(s) to {}", flushed.len(), handle);
        for (category, body) in flushed {
            if category.is_alert_style() {
                match self.is_muted(handle).await {
                    Ok(true) => {
                        debug!("Dropping queued {} notification, {} muted meanwhile", category, handle);
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Mute check for {} failed, flushing anyway: {}", handle, e),
                }
            }
            if let Err(e) = self.transport.send_message(handle, &body).await {
                warn!("Flush of {} notification failed: {}", category, e);
            }
        }
    }

    /// Whether the recipient is currently marked busy (used by tests and
    /// the status surface)
    pub async fn is_busy(&self, handle: &str) -> bool {
        self.presence.lock().await.is_busy(handle)
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay").finish_non_exhaustive()
    }
}
