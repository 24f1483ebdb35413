//! Uniform dedup policy
//!
//! Every dedup-based agent runs its fetched records through [`filter_new`]
//! with its own namespace. The rule, identical for all feeds:
//!
//! 1. namespace has prior history and the key is unseen: record it as
//!    seen and emit;
//! 2. very first poll cycle for the namespace (cold-start baseline):
//!    record as seen, suppress;
//! 3. key already seen: nothing.
//!
//! The baseline is what keeps a new watch from producing a burst of "new"
//! notifications for pre-existing state.

use herald_core::error::Result;
use herald_core::store::SeenStore;
use tracing::debug;

/// A fetched item with a stable identity and renderable text
pub trait Record {
    /// Stable identifier used for the seen test
    fn natural_key(&self) -> String;

    /// Text for the notification body
    fn summary(&self) -> String;
}

/// Filter `records` down to the ones that should be notified, recording
/// every unseen key along the way.
///
/// Keys are marked seen before the caller delivers anything: a crash
/// between mark-seen and delivery can drop at most one notification, and
/// never causes a duplicate burst on restart. A cycle that fetched nothing
/// still consumes the namespace's baseline.
pub async fn filter_new<R: Record>(
    store: &dyn SeenStore,
    namespace: &str,
    records: Vec<R>,
) -> Result<Vec<R>> {
    let baseline = !store.has_history(namespace).await?;

    let mut fresh = Vec::new();
    for record in records {
        let key = record.natural_key();
        if store.is_seen(namespace, &key).await? {
            continue;
        }
        store.mark_seen(namespace, &key).await?;
        if !baseline {
            fresh.push(record);
        }
    }

    if baseline {
        debug!("Namespace {} baselined, notifications suppressed", namespace);
    }
    store.touch(namespace).await?;
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_store::SqliteStore;

    struct Item(&'static str);

    impl Record for Item {
        fn natural_key(&self) -> String {
            self.0.to_string()
        }

        fn summary(&self) -> String {
            format!("item {}", self.0)
        }
    }

    #[tokio::test]
    async fn test_first_cycle_is_suppressed() {
        let store = SqliteStore::open_in_memory().unwrap();

        let fresh = filter_new(&store, "sales", vec![Item("a"), Item("b")])
            .await
            .unwrap();
        assert!(fresh.is_empty());
    }

    #[tokio::test]
    async fn test_second_cycle_emits_only_new_keys() {
        let store = SqliteStore::open_in_memory().unwrap();

        filter_new(&store, "sales", vec![Item("a"), Item("b")])
            .await
            .unwrap();
        let fresh = filter_new(&store, "sales", vec![Item("a"), Item("b"), Item("c")])
            .await
            .unwrap();

        let keys: Vec<String> = fresh.iter().map(|r| r.natural_key()).collect();
        assert_eq!(keys, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn test_identical_cycles_emit_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();

        filter_new(&store, "sales", vec![Item("a"), Item("b")])
            .await
            .unwrap();
        // prime past the baseline
        filter_new(&store, "sales", vec![Item("a"), Item("b"), Item("c")])
            .await
            .unwrap();
        let third = filter_new(&store, "sales", vec![Item("a"), Item("b"), Item("c")])
            .await
            .unwrap();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn test_empty_first_cycle_consumes_baseline() {
        let store = SqliteStore::open_in_memory().unwrap();

        let first = filter_new::<Item>(&store, "weather", vec![]).await.unwrap();
        assert!(first.is_empty());

        // Items that show up on the second cycle are genuinely new
        let second = filter_new(&store, "weather", vec![Item("x")]).await.unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let store = SqliteStore::open_in_memory().unwrap();

        filter_new(&store, "commits:bob:acme/widgets", vec![Item("c1")])
            .await
            .unwrap();

        // Same key in a different namespace still goes through its own
        // baseline
        let other = filter_new(&store, "commits:eve:acme/widgets", vec![Item("c1")])
            .await
            .unwrap();
        assert!(other.is_empty());
    }
}
