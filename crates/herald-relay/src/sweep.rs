//! Mute sweep
//!
//! A persisted mute is time-boxed; nothing un-mutes a subscriber at
//! delivery time. Instead this background task runs on its own fixed
//! interval, independent of every agent schedule, and flips `active` off
//! for any mute whose expiry has passed. The record itself is kept.

use chrono::Utc;
use herald_core::store::SubscriberStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub fn spawn_mute_sweep(
    store: Arc<dyn SubscriberStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Mute sweep started (every {:?})", interval);
        loop {
            if let Err(e) = sweep_once(store.as_ref()).await {
                // Store trouble: log and retry next interval
                error!("Mute sweep failed: {}", e);
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Mute sweep stopped");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    })
}

/// One pass: expire every active mute whose deadline has passed.
/// Returns how many subscribers were un-muted.
pub async fn sweep_once(store: &dyn SubscriberStore) -> herald_core::Result<usize> {
    let now = Utc::now();
    let mut expired = 0;

    for sub in store.list().await? {
        let Some(mute) = &sub.mute else { continue };
        if mute.active && mute.is_expired(now) {
            let mut cleared = mute.clone();
            cleared.active = false;
            store.set_mute(&sub.handle, Some(cleared)).await?;
            info!("Mute expired for {}", sub.handle);
            expired += 1;
        }
    }

    if expired == 0 {
        debug!("Mute sweep: nothing to expire");
    }
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use herald_core::types::{Mute, Subscriber};
    use herald_store::SqliteStore;

    fn muted_subscriber(handle: &str, expired: bool) -> Subscriber {
        let now = Utc::now();
        let mut sub = Subscriber::new(handle);
        sub.mute = Some(Mute {
            active: true,
            started: now - ChronoDuration::hours(5),
            expires: if expired {
                now - ChronoDuration::hours(1)
            } else {
                now + ChronoDuration::hours(1)
            },
        });
        sub
    }

    #[tokio::test]
    async fn test_sweep_expires_only_overdue_mutes() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&muted_subscriber("alice", true)).await.unwrap();
        store.upsert(&muted_subscriber("bob", false)).await.unwrap();
        store.upsert(&Subscriber::new("carol")).await.unwrap();

        let expired = sweep_once(&store).await.unwrap();
        assert_eq!(expired, 1);

        let alice = store.get("alice").await.unwrap().unwrap();
        let mute = alice.mute.as_ref().unwrap();
        assert!(!mute.active);
        assert!(!alice.is_muted(Utc::now()));

        let bob = store.get("bob").await.unwrap().unwrap();
        assert!(bob.is_muted(Utc::now()));
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&muted_subscriber("alice", true)).await.unwrap();

        assert_eq!(sweep_once(&store).await.unwrap(), 1);
        assert_eq!(sweep_once(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_task_unmutes_within_interval() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.upsert(&muted_subscriber("alice", true)).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn_mute_sweep(
            store.clone(),
            std::time::Duration::from_millis(50),
            cancel.clone(),
        );

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        let alice = store.get("alice").await.unwrap().unwrap();
        assert!(!alice.is_muted(Utc::now()));

        cancel.cancel();
        handle.await.unwrap();
    }
}
