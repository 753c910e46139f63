//! Source availability tracking.
//!
//! The last probe result is stored in the `availability` cache family. While
//! that record is fresh it answers [`AvailabilityTracker::is_available`]
//! without touching the network.

use crate::fetch::{FetchClient, endpoint};
use folio_core::{AvailabilityRecord, CacheFamily, CacheStore, Error};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const AVAILABILITY_KEY: &str = "sources";

pub struct AvailabilityTracker {
    bases: Vec<Url>,
    fetch: Arc<FetchClient>,
    store: Arc<CacheStore>,
    probe_timeout: Duration,
}

impl AvailabilityTracker {
    pub fn new(bases: Vec<Url>, fetch: Arc<FetchClient>, store: Arc<CacheStore>, probe_timeout: Duration) -> Self {
        Self { bases, fetch, store, probe_timeout }
    }

    /// The stored record, if still within its TTL.
    pub async fn current(&self) -> Option<AvailabilityRecord> {
        self.store.get(CacheFamily::Availability, AVAILABILITY_KEY).await
    }

    /// Whether any source is reachable, probing only when the record is stale.
    pub async fn is_available(&self) -> bool {
        if let Some(record) = self.current().await {
            tracing::debug!(available = record.available, "availability from cache");
            return record.available;
        }
        self.probe().await.available
    }

    /// Probe each base in order with a minimal request and store the result.
    pub async fn probe(&self) -> AvailabilityRecord {
        if self.bases.is_empty() {
            return self.mark(false, None, Some("no sources configured".into())).await;
        }

        let mut last_error = None;
        for base in &self.bases {
            match self.probe_one(base).await {
                Ok(()) => {
                    let source = base.as_str().trim_end_matches('/').to_string();
                    tracing::debug!(source = %source, "source reachable");
                    return self.mark(true, Some(source), None).await;
                }
                Err(e) => {
                    tracing::warn!(source = %base, error = %e, "availability probe failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        self.mark(false, None, last_error).await
    }

    async fn probe_one(&self, base: &Url) -> Result<(), Error> {
        let url = endpoint(base, "posts", [("per_page", Some("1".into())), ("_fields", Some("id".into()))])
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        self.fetch.get_json_with_timeout(&url, self.probe_timeout).await.map(|_| ())
    }

    /// Overwrite the availability record.
    pub async fn mark(&self, available: bool, source: Option<String>, last_error: Option<String>) -> AvailabilityRecord {
        let record = AvailabilityRecord { available, checked_at: self.store.now(), last_error, source };
        self.store.set(CacheFamily::Availability, AVAILABILITY_KEY, &record).await;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchConfig, parse_base};
    use chrono::Utc;
    use folio_core::{CacheDb, CachePolicy, ManualClock};
    use httpmock::prelude::*;

    async fn tracker(bases: Vec<Url>) -> (AvailabilityTracker, Arc<ManualClock>) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(CacheStore::new(db, CachePolicy::default()).with_clock(clock.clone()));
        let fetch = Arc::new(FetchClient::new(FetchConfig::default()).unwrap());
        (AvailabilityTracker::new(bases, fetch, store, Duration::from_secs(2)), clock)
    }

    fn ok_mock(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET).path("/posts").query_param("per_page", "1").query_param("_fields", "id");
            then.status(200).header("content-type", "application/json").body(r#"[{"id":1}]"#);
        })
    }

    #[tokio::test]
    async fn test_first_reachable_source_wins() {
        let down = MockServer::start();
        let down_mock = down.mock(|when, then| {
            when.method(GET).path("/posts");
            then.status(503);
        });
        let up = MockServer::start();
        let up_mock = ok_mock(&up);

        let bases = vec![parse_base(&down.base_url()).unwrap(), parse_base(&up.base_url()).unwrap()];
        let (tracker, _) = tracker(bases).await;

        let record = tracker.probe().await;
        assert!(record.available);
        assert_eq!(record.source.as_deref(), Some(up.base_url().as_str()));
        assert_eq!(down_mock.hits(), 1);
        assert_eq!(up_mock.hits(), 1);
    }

    #[tokio::test]
    async fn test_fresh_record_skips_network() {
        let server = MockServer::start();
        let mock = ok_mock(&server);
        let (tracker, clock) = tracker(vec![parse_base(&server.base_url()).unwrap()]).await;

        assert!(tracker.is_available().await);
        assert!(tracker.is_available().await);
        assert_eq!(mock.hits(), 1);

        clock.advance(chrono::Duration::minutes(6));
        assert!(tracker.is_available().await);
        assert_eq!(mock.hits(), 2);
    }

    #[tokio::test]
    async fn test_all_failing_marks_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/posts");
            then.status(500);
        });
        let (tracker, _) = tracker(vec![parse_base(&server.base_url()).unwrap()]).await;

        assert!(!tracker.is_available().await);
        let stored = tracker.current().await.expect("record stored");
        assert!(!stored.available);
        assert!(stored.last_error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_no_sources() {
        let (tracker, _) = tracker(Vec::new()).await;
        let record = tracker.probe().await;
        assert!(!record.available);
        assert_eq!(record.last_error.as_deref(), Some("no sources configured"));
    }
}
