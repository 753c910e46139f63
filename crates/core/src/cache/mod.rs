//! SQLite-backed persistent cache.
//!
//! This module provides the storage side of the sync layer:
//!
//! - A string key-value table accessed through tokio-rusqlite ([`KvStore`])
//! - Automatic schema migrations and WAL mode
//! - A family-aware [`CacheStore`] with per-family TTLs and lazy eviction
//! - Deterministic cache key hashing

pub mod connection;
pub mod hash;
pub mod kv;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::compute_cache_key;
pub use kv::KvStore;
pub use store::{CacheEntry, CacheFamily, CachePolicy, CacheStore};
