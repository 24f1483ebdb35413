//! Discord chat transport using Serenity
//!
//! Herald talks to its people over DMs. A contact becomes addressable once
//! they have DM'd the daemon (and are on the allow list); since they opened
//! the conversation themselves, every known contact counts as a mutual
//! relationship for broadcast resolution. Do-not-disturb presence updates
//! drive the relay's busy tracker.

use anyhow::{Result as AnyResult, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;
use herald_core::error::{Error, Result};
use herald_core::transport::{ChatTransport, Relationship, TransportEvent};
use serenity::{
    gateway::GatewayError, model::gateway::Presence, model::gateway::Ready, model::prelude::*,
    prelude::*,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

/// Discord's maximum message length in characters
const DISCORD_MAX_LENGTH: usize = 2000;

/// Type key for the event sender handed to the daemon's main loop
struct EventSender;

impl TypeMapKey for EventSender {
    type Value = mpsc::Sender<TransportEvent>;
}

/// Type key for the handle -> DM channel map
struct ContactChannels;

impl TypeMapKey for ContactChannels {
    type Value = Arc<DashMap<String, ChannelId>>;
}

/// Type key for the user id -> handle map (presence events carry ids only)
struct ContactHandles;

impl TypeMapKey for ContactHandles {
    type Value = Arc<DashMap<UserId, String>>;
}

/// Type key for the allow list
struct AllowedUsers;

impl TypeMapKey for AllowedUsers {
    type Value = Vec<UserId>;
}

fn display_handle(user: &User) -> String {
    match user.discriminator {
        Some(d) => format!("{}#{:04}", user.name, d),
        None => user.name.clone(),
    }
}

struct DiscordHandler;

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        // DMs only; guild chatter is not addressed to us
        if msg.guild_id.is_some() {
            return;
        }

        let data = ctx.data.read().await;
        let allowed = match data.get::<AllowedUsers>() {
            Some(users) => users,
            None => {
                error!("AllowedUsers not initialized in TypeMap");
                return;
            }
        };

        if !allowed.is_empty() && !allowed.contains(&msg.author.id) {
            warn!("Ignoring DM from unauthorized user {}", msg.author.id);
            return;
        }

        let handle = display_handle(&msg.author);

        // Learn the contact so replies and broadcasts can reach them
        if let Some(channels) = data.get::<ContactChannels>() {
            channels.insert(handle.clone(), msg.channel_id);
        }
        if let Some(handles) = data.get::<ContactHandles>() {
            handles.insert(msg.author.id, handle.clone());
        }

        let tx = match data.get::<EventSender>() {
            Some(tx) => tx.clone(),
            None => {
                error!("EventSender not initialized in TypeMap");
                return;
            }
        };
        drop(data);

        debug!("Inbound DM from {}", handle);
        let event = TransportEvent::Message {
            sender: handle,
            body: msg.content.clone(),
        };
        if let Err(e) = tx.send(event).await {
            error!("Failed to forward Discord message: {}", e);
        }
    }

    async fn presence_update(&self, ctx: Context, new_data: Presence) {
        let busy = matches!(new_data.status, OnlineStatus::DoNotDisturb);

        let data = ctx.data.read().await;
        // Presence events carry ids; only contacts we already know matter
        let handle = data
            .get::<ContactHandles>()
            .and_then(|handles| handles.get(&new_data.user.id).map(|h| h.clone()));

        let Some(handle) = handle else {
            return;
        };
        let tx = match data.get::<EventSender>() {
            Some(tx) => tx.clone(),
            None => return,
        };
        drop(data);

        debug!("Presence change for {}: busy={}", handle, busy);
        if let Err(e) = tx.send(TransportEvent::Presence { handle, busy }).await {
            error!("Failed to forward presence change: {}", e);
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Discord connected as {}", ready.user.name);
    }
}

/// Discord transport adapter
pub struct DiscordTransport {
    token: String,
    allowed_users: Vec<String>,
    http: Arc<RwLock<Option<Arc<serenity::http::Http>>>>,
    contacts: Arc<DashMap<String, ChannelId>>,
    handles: Arc<DashMap<UserId, String>>,
}

impl DiscordTransport {
    /// `allowed_users` are Discord user ids as strings; an empty list
    /// accepts DMs from anyone.
    pub fn new(token: String, allowed_users: Vec<String>) -> Self {
        Self {
            token,
            allowed_users,
            http: Arc::new(RwLock::new(None)),
            contacts: Arc::new(DashMap::new()),
            handles: Arc::new(DashMap::new()),
        }
    }

    fn parse_user_ids(&self) -> AnyResult<Vec<UserId>> {
        self.allowed_users
            .iter()
            .map(|id_str| {
                id_str
                    .parse::<u64>()
                    .map(UserId::new)
                    .map_err(|e| anyhow!("Invalid Discord user ID '{}': {}", id_str, e))
            })
            .collect()
    }
}

/// Gateway conditions that retrying cannot fix
fn is_fatal_gateway_error(err: &serenity::Error) -> bool {
    match err {
        serenity::Error::Gateway(gateway_err) => matches!(
            gateway_err,
            GatewayError::InvalidAuthentication
                | GatewayError::NoAuthentication
                | GatewayError::DisallowedGatewayIntents
                | GatewayError::InvalidGatewayIntents
        ),
        _ => false,
    }
}

/// Split a body into chunks under Discord's length limit, preferring line
/// boundaries.
fn split_message(content: &str) -> Vec<String> {
    if content.chars().count() <= DISCORD_MAX_LENGTH {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in content.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > DISCORD_MAX_LENGTH && current_len > 0 {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > DISCORD_MAX_LENGTH {
            // A single oversized line gets a hard split
            for ch in line.chars() {
                if current_len == DISCORD_MAX_LENGTH {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(ch);
                current_len += 1;
            }
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    async fn start(&self, tx: mpsc::Sender<TransportEvent>) -> AnyResult<()> {
        let user_ids = self.parse_user_ids()?;
        info!("Starting Discord transport ({} allowed users)", user_ids.len());

        let token = self.token.clone();
        let contacts = self.contacts.clone();
        let handles = self.handles.clone();
        let http_arc = self.http.clone();

        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            let max_backoff = Duration::from_secs(60);

            loop {
                let intents = GatewayIntents::DIRECT_MESSAGES
                    | GatewayIntents::MESSAGE_CONTENT
                    | GatewayIntents::GUILDS
                    | GatewayIntents::GUILD_PRESENCES;

                let mut client = match Client::builder(&token, intents)
                    .event_handler(DiscordHandler)
                    .await
                {
                    Ok(c) => c,
                    Err(e) => {
                        if is_fatal_gateway_error(&e) {
                            error!("Discord fatal error (will not retry): {}", e);
                            break;
                        }
                        error!("Failed to create Discord client: {}", e);
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(max_backoff);
                        continue;
                    }
                };

                {
                    let mut data = client.data.write().await;
                    data.insert::<EventSender>(tx.clone());
                    data.insert::<ContactChannels>(contacts.clone());
                    data.insert::<ContactHandles>(handles.clone());
                    data.insert::<AllowedUsers>(user_ids.clone());
                }

                {
                    let mut http_guard = http_arc.write().await;
                    *http_guard = Some(client.http.clone());
                }

                match client.start().await {
                    Ok(()) => {
                        info!("Discord client stopped cleanly");
                        break;
                    }
                    Err(e) => {
                        if is_fatal_gateway_error(&e) {
                            error!("Discord fatal error (will not retry): {}", e);
                            break;
                        }
                        error!("Discord client error: {}", e);
                        warn!("Reconnecting in {:?}", backoff);
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(max_backoff);
                    }
                }
            }
        });

        Ok(())
    }

    async fn send_message(&self, handle: &str, body: &str) -> Result<()> {
        let delivery_err = |reason: String| Error::Delivery {
            recipient: handle.to_string(),
            reason,
        };

        let http_guard = self.http.read().await;
        let http = http_guard
            .as_ref()
            .ok_or_else(|| delivery_err("transport not connected".to_string()))?;

        let channel_id = self
            .contacts
            .get(handle)
            .map(|entry| *entry.value())
            .ok_or_else(|| delivery_err("unknown contact".to_string()))?;

        for chunk in split_message(body) {
            channel_id
                .say(http, chunk)
                .await
                .map_err(|e| delivery_err(e.to_string()))?;
        }

        debug!("Sent Discord message to {}", handle);
        Ok(())
    }

    async fn list_relationships(&self) -> Result<Vec<(String, Relationship)>> {
        // Every learned contact DM'd us first, which makes the relationship
        // mutual by construction
        Ok(self
            .contacts
            .iter()
            .map(|entry| (entry.key().clone(), Relationship::Mutual))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_user_ids() {
        let transport = DiscordTransport::new(
            "token".to_string(),
            vec!["123456789".to_string(), "987654321".to_string()],
        );
        assert_eq!(transport.parse_user_ids().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_invalid_user_id() {
        let transport =
            DiscordTransport::new("token".to_string(), vec!["not-a-number".to_string()]);
        assert!(transport.parse_user_ids().is_err());
    }

    #[test]
    fn test_split_message_short() {
        let chunks = split_message("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_split_message_prefers_line_boundaries() {
        let msg = format!("first line\n{}", "a".repeat(1995));
        let chunks = split_message(&msg);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].starts_with("first line"));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= DISCORD_MAX_LENGTH);
        }
    }

    #[test]
    fn test_split_message_oversized_line() {
        let msg = "a".repeat(4500);
        let chunks = split_message(&msg);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= DISCORD_MAX_LENGTH);
        }
    }

    #[tokio::test]
    async fn test_send_before_start_is_delivery_error() {
        let transport = DiscordTransport::new("token".to_string(), vec![]);
        let err = transport.send_message("alice", "hi").await.unwrap_err();
        assert!(matches!(err, Error::Delivery { .. }));
    }
}
