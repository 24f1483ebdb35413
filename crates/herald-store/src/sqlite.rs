//! SQLite-backed stores

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use chrono::Utc;
use herald_core::error::{Error, Result};
use herald_core::store::{AuditStore, SeenStore, SubscriberStore};
use herald_core::types::{Mute, Subscriber};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// All three store traits backed by one SQLite connection.
///
/// rusqlite is synchronous; the connection sits behind an async mutex and
/// every call holds it only for the duration of one statement or one
/// read-modify-write of a single record.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

fn json_err(e: serde_json::Error) -> Error {
    Error::Store(format!("subscriber document corrupt: {}", e))
}

impl SqliteStore {
    /// Open (or create) the database at `path` and initialize tables
    pub fn open(path: &Path) -> AnyResult<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        init_tables(&conn)?;
        info!("Opened store at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> AnyResult<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        init_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_subscriber(doc_json: &str) -> Result<Subscriber> {
        serde_json::from_str(doc_json).map_err(json_err)
    }

    async fn modify<F>(&self, handle: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Subscriber),
    {
        let conn = self.conn.lock().await;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc_json FROM subscribers WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;

        let Some(doc) = doc else {
            return Ok(false);
        };

        let mut sub = Self::row_to_subscriber(&doc)?;
        f(&mut sub);
        write_subscriber(&conn, &sub)?;
        Ok(true)
    }
}

/// Create tables if they don't exist. Safe to call repeatedly.
fn init_tables(conn: &Connection) -> AnyResult<()> {
    debug!("Initializing store tables");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subscribers (
            handle TEXT PRIMARY KEY,
            admin INTEGER NOT NULL DEFAULT 0,
            doc_json TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create subscribers table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seen_items (
            namespace TEXT NOT NULL,
            natural_key TEXT NOT NULL,
            first_seen_at TEXT NOT NULL,
            PRIMARY KEY (namespace, natural_key)
        )",
        [],
    )
    .context("Failed to create seen_items table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seen_namespaces (
            namespace TEXT PRIMARY KEY,
            first_cycle_at TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create seen_namespaces table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender TEXT NOT NULL,
            body TEXT NOT NULL,
            command TEXT NOT NULL,
            args_json TEXT NOT NULL,
            received_at TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create messages table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender)",
        [],
    )
    .context("Failed to create messages sender index")?;

    Ok(())
}

fn write_subscriber(conn: &Connection, sub: &Subscriber) -> Result<()> {
    let doc = serde_json::to_string(sub).map_err(json_err)?;
    conn.execute(
        "INSERT INTO subscribers (handle, admin, doc_json)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(handle) DO UPDATE SET
            admin = excluded.admin,
            doc_json = excluded.doc_json",
        params![&sub.handle, sub.admin as i32, &doc],
    )
    .map_err(store_err)?;
    Ok(())
}

#[async_trait]
impl SubscriberStore for SqliteStore {
    async fn get(&self, handle: &str) -> Result<Option<Subscriber>> {
        let conn = self.conn.lock().await;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc_json FROM subscribers WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;

        doc.map(|d| Self::row_to_subscriber(&d)).transpose()
    }

    async fn list(&self) -> Result<Vec<Subscriber>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT handle, doc_json FROM subscribers")
            .map_err(store_err)?;

        let rows = stmt
            .query_map([], |row| {
                let handle: String = row.get(0)?;
                let doc: String = row.get(1)?;
                Ok((handle, doc))
            })
            .map_err(store_err)?;

        let mut subs = Vec::new();
        for row in rows {
            let (handle, doc) = row.map_err(store_err)?;
            match Self::row_to_subscriber(&doc) {
                Ok(sub) => subs.push(sub),
                Err(e) => warn!("Skipping unreadable subscriber {}: {}", handle, e),
            }
        }
        Ok(subs)
    }

    async fn upsert(&self, sub: &Subscriber) -> Result<()> {
        let conn = self.conn.lock().await;
        write_subscriber(&conn, sub)?;
        debug!("Upserted subscriber {}", sub.handle);
        Ok(())
    }

    async fn delete(&self, handle: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let n = conn
            .execute(
                "DELETE FROM subscribers WHERE handle = ?1",
                params![handle],
            )
            .map_err(store_err)?;
        Ok(n > 0)
    }

    async fn is_admin(&self, handle: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let admin: Option<i32> = conn
            .query_row(
                "SELECT admin FROM subscribers WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err)?;
        Ok(admin.unwrap_or(0) != 0)
    }

    async fn set_mute(&self, handle: &str, mute: Option<Mute>) -> Result<bool> {
        self.modify(handle, |sub| sub.mute = mute).await
    }

    async fn pull_sale_watch(&self, handle: &str, name: &str) -> Result<bool> {
        let mut removed = false;
        let existed = self
            .modify(handle, |sub| {
                let before = sub.sale_watches.len();
                sub.sale_watches.retain(|w| w.name != name);
                removed = sub.sale_watches.len() != before;
            })
            .await?;
        Ok(existed && removed)
    }
}

#[async_trait]
impl SeenStore for SqliteStore {
    async fn has_history(&self, namespace: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM seen_namespaces WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        Ok(n > 0)
    }

    async fn is_seen(&self, namespace: &str, key: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM seen_items WHERE namespace = ?1 AND natural_key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        Ok(n > 0)
    }

    async fn mark_seen(&self, namespace: &str, key: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO seen_items (namespace, natural_key, first_seen_at)
             VALUES (?1, ?2, ?3)",
            params![namespace, key, Utc::now().to_rfc3339()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn touch(&self, namespace: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO seen_namespaces (namespace, first_cycle_at)
             VALUES (?1, ?2)",
            params![namespace, Utc::now().to_rfc3339()],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for SqliteStore {
    async fn record_message(
        &self,
        sender: &str,
        body: &str,
        command: &str,
        args: &[String],
    ) -> Result<()> {
        let args_json = serde_json::to_string(args).map_err(json_err)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO messages (sender, body, command, args_json, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![sender, body, command, &args_json, Utc::now().to_rfc3339()],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::types::{RepoWatch, SaleWatch};

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn test_subscriber_roundtrip() {
        let s = store();

        let mut sub = Subscriber::new("alice");
        sub.same_codes.insert("029095".to_string());
        sub.repos.insert(RepoWatch {
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
        });
        sub.admin = true;

        s.upsert(&sub).await.unwrap();

        let loaded = s.get("alice").await.unwrap().unwrap();
        assert_eq!(loaded, sub);
        assert!(s.is_admin("alice").await.unwrap());
        assert!(!s.is_admin("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let s = store();
        s.upsert(&Subscriber::new("alice")).await.unwrap();

        let mut updated = Subscriber::new("alice");
        updated.same_codes.insert("012345".to_string());
        s.upsert(&updated).await.unwrap();

        let subs = s.list().await.unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].same_codes.contains("012345"));
    }

    #[tokio::test]
    async fn test_delete() {
        let s = store();
        s.upsert(&Subscriber::new("alice")).await.unwrap();
        assert!(SubscriberStore::delete(&s, "alice").await.unwrap());
        assert!(!SubscriberStore::delete(&s, "alice").await.unwrap());
        assert!(s.get("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_mute() {
        let s = store();
        s.upsert(&Subscriber::new("alice")).await.unwrap();

        assert!(s.set_mute("alice", Some(Mute::for_hours(4))).await.unwrap());
        let sub = s.get("alice").await.unwrap().unwrap();
        assert!(sub.is_muted(Utc::now()));

        // Unknown handle is a no-op
        assert!(!s.set_mute("nobody", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_pull_sale_watch() {
        let s = store();
        let mut sub = Subscriber::new("bob");
        sub.add_sale_watch(SaleWatch {
            name: "widgets".to_string(),
            url: "https://store.example/widgets".to_string(),
            price: 4.99,
            discount: false,
        });
        s.upsert(&sub).await.unwrap();

        assert!(s.pull_sale_watch("bob", "widgets").await.unwrap());
        assert!(!s.pull_sale_watch("bob", "widgets").await.unwrap());
        assert!(s.get("bob").await.unwrap().unwrap().sale_watches.is_empty());
    }

    #[tokio::test]
    async fn test_seen_store_membership() {
        let s = store();
        assert!(!s.has_history("sales").await.unwrap());
        assert!(!s.is_seen("sales", "g1:123").await.unwrap());

        s.mark_seen("sales", "g1:123").await.unwrap();
        s.mark_seen("sales", "g1:123").await.unwrap(); // idempotent
        s.touch("sales").await.unwrap();

        assert!(s.has_history("sales").await.unwrap());
        assert!(s.is_seen("sales", "g1:123").await.unwrap());
        // Namespaces are independent
        assert!(!s.is_seen("weather", "g1:123").await.unwrap());
        assert!(!s.has_history("weather").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_first_cycle_still_counts_as_history() {
        let s = store();
        // A cycle that fetched nothing still consumes the baseline
        s.touch("commits:bob:acme/widgets").await.unwrap();
        assert!(s.has_history("commits:bob:acme/widgets").await.unwrap());
    }

    #[tokio::test]
    async fn test_audit_record() {
        let s = store();
        s.record_message("alice", "solve 1+1", "solve", &["1+1".to_string()])
            .await
            .unwrap();

        let conn = s.conn.lock().await;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_init_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_tables(&conn).unwrap();
        init_tables(&conn).unwrap();
    }
}
