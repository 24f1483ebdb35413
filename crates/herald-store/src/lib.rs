//! SQLite persistence for herald
//!
//! One database file holds three tables: subscriber documents, the
//! per-namespace seen-key log used for dedup, and the inbound message
//! audit trail. Subscriber records are stored as JSON documents with the
//! admin flag broken out into a column for the permission lookup.

pub mod sqlite;

pub use sqlite::SqliteStore;
