//! Family-aware cache store on top of [`KvStore`].
//!
//! Values are wrapped in a [`CacheEntry`] that records the family and the
//! write time, serialized to JSON and stored under `"{family}:{key}"`.
//!
//! - Reads treat an expired entry as absent and delete it (lazy eviction, no
//!   background sweep).
//! - Writes are best-effort: a storage failure is logged and swallowed.
//! - Merges are serialized through a lock so read-modify-write cycles on the
//!   same store never interleave.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::kv::KvStore;
use crate::Error;
use crate::clock::{Clock, SystemClock};

/// Named cache partition with its own expiry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheFamily {
    /// Validated pages as returned by a content source.
    ApiPages,
    /// Sanitized, display-ready pages.
    Posts,
    /// Result of the last reachability probe.
    Availability,
    /// Long-lived snapshot of every record seen; never expires.
    LocalSync,
    /// Last fetch outcome for diagnostics; never expires.
    Status,
}

impl CacheFamily {
    pub const ALL: [CacheFamily; 5] = [
        CacheFamily::ApiPages,
        CacheFamily::Posts,
        CacheFamily::Availability,
        CacheFamily::LocalSync,
        CacheFamily::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheFamily::ApiPages => "api_pages",
            CacheFamily::Posts => "posts",
            CacheFamily::Availability => "availability",
            CacheFamily::LocalSync => "local_sync",
            CacheFamily::Status => "status",
        }
    }

    /// Parse the storage name of a family.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.as_str())
    }
}

impl fmt::Display for CacheFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-to-live per family. Families not listed here never expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub api_pages: Duration,
    pub posts: Duration,
    pub availability: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            api_pages: Duration::minutes(30),
            posts: Duration::minutes(30),
            availability: Duration::minutes(5),
        }
    }
}

impl CachePolicy {
    pub fn ttl(&self, family: CacheFamily) -> Option<Duration> {
        match family {
            CacheFamily::ApiPages => Some(self.api_pages),
            CacheFamily::Posts => Some(self.posts),
            CacheFamily::Availability => Some(self.availability),
            CacheFamily::LocalSync | CacheFamily::Status => None,
        }
    }
}

/// A stored value with its family tag and write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub family: CacheFamily,
    pub written_at: DateTime<Utc>,
    pub payload: T,
}

impl<T> CacheEntry<T> {
    /// An entry is expired once its age is strictly greater than `ttl`.
    pub fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        ttl.is_some_and(|ttl| now - self.written_at > ttl)
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.written_at
    }
}

/// Family-aware cache over a shared [`KvStore`].
pub struct CacheStore {
    kv: Arc<dyn KvStore>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    merge_lock: Mutex<()>,
}

impl CacheStore {
    pub fn new(kv: Arc<dyn KvStore>, policy: CachePolicy) -> Self {
        Self { kv, policy, clock: Arc::new(SystemClock), merge_lock: Mutex::new(()) }
    }

    /// Replace the time source used for write stamps and expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn storage_key(family: CacheFamily, key: &str) -> String {
        format!("{}:{}", family.as_str(), key)
    }

    /// Read a fresh payload, or `None` when absent, expired or unreadable.
    pub async fn get<T: DeserializeOwned>(&self, family: CacheFamily, key: &str) -> Option<T> {
        self.get_entry(family, key).await.map(|entry| entry.payload)
    }

    /// Read a fresh entry including its write time.
    pub async fn get_entry<T: DeserializeOwned>(&self, family: CacheFamily, key: &str) -> Option<CacheEntry<T>> {
        match self.read_entry(family, key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(family = %family, key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn read_entry<T: DeserializeOwned>(
        &self, family: CacheFamily, key: &str,
    ) -> Result<Option<CacheEntry<T>>, Error> {
        let storage_key = Self::storage_key(family, key);
        let Some(raw) = self.kv.get(&storage_key).await? else {
            return Ok(None);
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(family = %family, key, error = %e, "discarding undecodable cache entry");
                self.evict(&storage_key).await;
                return Ok(None);
            }
        };

        if entry.family != family {
            tracing::warn!(family = %family, stored = %entry.family, key, "cache entry family mismatch");
            return Ok(None);
        }

        let now = self.clock.now();
        if entry.is_expired(self.policy.ttl(family), now) {
            tracing::debug!(family = %family, key, age_secs = entry.age(now).num_seconds(), "cache entry expired");
            self.evict(&storage_key).await;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn evict(&self, storage_key: &str) {
        if let Err(e) = self.kv.remove(storage_key).await {
            tracing::warn!(key = storage_key, error = %e, "cache eviction failed");
        }
    }

    /// Store `value`, stamped with the current time. Never fails.
    pub async fn set<T: Serialize>(&self, family: CacheFamily, key: &str, value: &T) {
        if let Err(e) = self.write(family, key, value).await {
            tracing::warn!(family = %family, key, error = %e, "cache write failed");
        }
    }

    async fn write<T: Serialize>(&self, family: CacheFamily, key: &str, value: &T) -> Result<(), Error> {
        let entry = CacheEntry { family, written_at: self.clock.now(), payload: value };
        let raw = serde_json::to_string(&entry)?;
        self.kv.set(&Self::storage_key(family, key), &raw).await
    }

    /// Read-modify-write under the merge lock.
    ///
    /// `updater` receives the current fresh payload (or `None`) and returns the
    /// value to store. If the current value cannot be read because storage
    /// failed, the merge is abandoned so existing data is never clobbered.
    /// Returns the merged value when it was computed.
    pub async fn merge<T, F>(&self, family: CacheFamily, key: &str, updater: F) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        let _guard = self.merge_lock.lock().await;

        let current = match self.read_entry::<T>(family, key).await {
            Ok(entry) => entry.map(|e| e.payload),
            Err(e) => {
                tracing::warn!(family = %family, key, error = %e, "cache merge skipped, current value unreadable");
                return None;
            }
        };

        let merged = updater(current);
        self.set(family, key, &merged).await;
        Some(merged)
    }

    pub async fn remove(&self, family: CacheFamily, key: &str) {
        self.evict(&Self::storage_key(family, key)).await;
    }

    /// Delete every entry of `family`.
    pub async fn purge_family(&self, family: CacheFamily) -> Result<u64, Error> {
        self.kv.remove_prefix(&family.prefix()).await
    }

    pub async fn count_family(&self, family: CacheFamily) -> Result<u64, Error> {
        self.kv.count_prefix(&family.prefix()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::clock::ManualClock;
    use async_trait::async_trait;

    async fn store_with_clock() -> (CacheStore, Arc<ManualClock>, Arc<CacheDb>) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = CacheStore::new(db.clone(), CachePolicy::default()).with_clock(clock.clone());
        (store, clock, db)
    }

    /// Storage that rejects every operation, like a full or missing disk.
    struct FailingStore;

    #[async_trait]
    impl KvStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, Error> {
            Err(Error::Serialization("storage unavailable".into()))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<(), Error> {
            Err(Error::Serialization("quota exceeded".into()))
        }
        async fn remove(&self, _key: &str) -> Result<(), Error> {
            Err(Error::Serialization("storage unavailable".into()))
        }
        async fn remove_prefix(&self, _prefix: &str) -> Result<u64, Error> {
            Err(Error::Serialization("storage unavailable".into()))
        }
        async fn count_prefix(&self, _prefix: &str) -> Result<u64, Error> {
            Err(Error::Serialization("storage unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (store, _, _) = store_with_clock().await;
        store.set(CacheFamily::ApiPages, "k", &vec![1, 2, 3]).await;
        let value: Option<Vec<i32>> = store.get(CacheFamily::ApiPages, "k").await;
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_families_are_isolated() {
        let (store, _, _) = store_with_clock().await;
        store.set(CacheFamily::ApiPages, "k", &"api").await;
        store.set(CacheFamily::Posts, "k", &"posts").await;
        assert_eq!(store.get::<String>(CacheFamily::ApiPages, "k").await.as_deref(), Some("api"));
        assert_eq!(store.get::<String>(CacheFamily::Posts, "k").await.as_deref(), Some("posts"));
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let (store, clock, _) = store_with_clock().await;
        let ttl = CachePolicy::default().api_pages;
        store.set(CacheFamily::ApiPages, "k", &"v").await;

        clock.advance(ttl - Duration::milliseconds(1));
        assert_eq!(store.get::<String>(CacheFamily::ApiPages, "k").await.as_deref(), Some("v"));

        clock.advance(Duration::milliseconds(2));
        assert!(store.get::<String>(CacheFamily::ApiPages, "k").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted() {
        let (store, clock, db) = store_with_clock().await;
        store.set(CacheFamily::Availability, "status", &true).await;
        clock.advance(Duration::minutes(6));

        assert!(store.get::<bool>(CacheFamily::Availability, "status").await.is_none());
        assert!(db.get("availability:status").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_family_never_expires() {
        let (store, clock, _) = store_with_clock().await;
        store.set(CacheFamily::LocalSync, "snapshot", &"kept").await;
        clock.advance(Duration::days(365));
        assert_eq!(store.get::<String>(CacheFamily::LocalSync, "snapshot").await.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_dropped() {
        let (store, _, db) = store_with_clock().await;
        db.set("posts:broken", "not json").await.unwrap();
        assert!(store.get::<String>(CacheFamily::Posts, "broken").await.is_none());
        assert!(db.get("posts:broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_applies_updater() {
        let (store, _, _) = store_with_clock().await;
        let first = store
            .merge(CacheFamily::LocalSync, "n", |current: Option<Vec<i32>>| {
                assert!(current.is_none());
                vec![1]
            })
            .await;
        assert_eq!(first, Some(vec![1]));

        let second = store
            .merge(CacheFamily::LocalSync, "n", |current: Option<Vec<i32>>| {
                let mut v = current.unwrap_or_default();
                v.push(2);
                v
            })
            .await;
        assert_eq!(second, Some(vec![1, 2]));
        assert_eq!(store.get::<Vec<i32>>(CacheFamily::LocalSync, "n").await, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_writes_are_best_effort() {
        let store = CacheStore::new(Arc::new(FailingStore), CachePolicy::default());
        store.set(CacheFamily::ApiPages, "k", &"v").await;
        assert!(store.get::<String>(CacheFamily::ApiPages, "k").await.is_none());
        store.remove(CacheFamily::ApiPages, "k").await;
    }

    #[tokio::test]
    async fn test_merge_skipped_when_unreadable() {
        let store = CacheStore::new(Arc::new(FailingStore), CachePolicy::default());
        let merged = store
            .merge(CacheFamily::LocalSync, "snapshot", |_: Option<Vec<i32>>| vec![1])
            .await;
        assert!(merged.is_none());
    }

    #[tokio::test]
    async fn test_purge_and_count_family() {
        let (store, _, _) = store_with_clock().await;
        store.set(CacheFamily::ApiPages, "a", &1).await;
        store.set(CacheFamily::ApiPages, "b", &2).await;
        store.set(CacheFamily::LocalSync, "snapshot", &3).await;

        assert_eq!(store.count_family(CacheFamily::ApiPages).await.unwrap(), 2);
        assert_eq!(store.purge_family(CacheFamily::ApiPages).await.unwrap(), 2);
        assert_eq!(store.count_family(CacheFamily::ApiPages).await.unwrap(), 0);
        assert_eq!(store.count_family(CacheFamily::LocalSync).await.unwrap(), 1);
    }

    #[test]
    fn test_family_parse() {
        for family in CacheFamily::ALL {
            assert_eq!(CacheFamily::parse(family.as_str()), Some(family));
        }
        assert_eq!(CacheFamily::parse("nope"), None);
    }
}
