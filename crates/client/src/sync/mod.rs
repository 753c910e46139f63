//! Multi-source content synchronization.
//!
//! [`ContentSync`] owns the whole read path:
//!
//! 1. Page cache lookup (unless bypassed)
//! 2. Upstream sources in configured order, skipped while a fresh
//!    availability record says they are down
//! 3. Local snapshot, filtered and paginated in memory (degraded)
//! 4. Internal origin mirror (fallback)
//! 5. Empty result
//!
//! Only results from live sources are cached and merged into the snapshot.
//! Every outcome writes a [`StatusSignal`].

pub mod availability;
pub mod cascade;
pub mod mirror;
pub mod preload;
pub mod query;
pub mod snapshot;
pub mod source;

pub use availability::AvailabilityTracker;
pub use cascade::{Cascade, Tier};
pub use mirror::MirrorTier;
pub use preload::{PreloadOutcome, Preloader};
pub use query::{Origin, PageQuery, PageResult};
pub use snapshot::SnapshotTier;
pub use source::SourceTier;

use crate::convert::to_posts;
use crate::fetch::{FetchClient, FetchConfig, parse_base};
use chrono::{DateTime, Utc};
use folio_core::{
    AppConfig, AvailabilityRecord, CacheFamily, CacheStore, Error, LocalSyncSnapshot, Post, StatusLevel, StatusSignal,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Key of the most recent signal in the `status` family.
pub const STATUS_KEY: &str = "last";

/// Fields requested by the deferred preload refresh.
pub const PREVIEW_FIELDS: &[&str] = &["id", "date", "slug", "title", "excerpt"];

/// Tunables for [`ContentSync`].
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub default_per_page: u32,
    pub preload_per_page: u32,
    pub preload_delay: Duration,
    pub probe_timeout: Duration,
    pub snapshot_cap: Option<usize>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            default_per_page: 10,
            preload_per_page: 5,
            preload_delay: Duration::from_millis(2000),
            probe_timeout: Duration::from_millis(10_000),
            snapshot_cap: Some(500),
        }
    }
}

impl From<&AppConfig> for SyncOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_per_page: config.default_per_page,
            preload_per_page: config.preload_per_page,
            preload_delay: config.preload_delay(),
            probe_timeout: config.probe_timeout(),
            snapshot_cap: config.snapshot_cap(),
        }
    }
}

/// A page of display-ready posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total_pages: u64,
    pub total: u64,
    pub origin: Origin,
}

/// Point-in-time view of the sync layer's bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub availability: Option<AvailabilityRecord>,
    pub last_signal: Option<StatusSignal>,
    pub snapshot_records: usize,
    pub snapshot_updated_at: Option<DateTime<Utc>>,
    pub sources: Vec<String>,
    pub mirror: Option<String>,
}

/// Orchestrates sources, fallbacks and the cache.
pub struct ContentSync {
    sources: Vec<SourceTier>,
    snapshot: SnapshotTier,
    mirror: Option<MirrorTier>,
    availability: AvailabilityTracker,
    store: Arc<CacheStore>,
    options: SyncOptions,
}

impl ContentSync {
    /// Build the orchestrator from configuration.
    pub fn from_config(config: &AppConfig, store: Arc<CacheStore>) -> Result<Self, Error> {
        let fetch = Arc::new(FetchClient::new(FetchConfig::from(config))?);
        let sources = config
            .sources
            .iter()
            .map(|raw| parse_base(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let mirror = config
            .mirror_url
            .as_deref()
            .map(|raw| parse_base(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}"))))
            .transpose()?;

        Ok(Self::new(sources, mirror, fetch, store, SyncOptions::from(config)))
    }

    pub fn new(
        sources: Vec<url::Url>, mirror: Option<url::Url>, fetch: Arc<FetchClient>, store: Arc<CacheStore>,
        options: SyncOptions,
    ) -> Self {
        let clock = store.clock();
        let availability = AvailabilityTracker::new(sources.clone(), fetch.clone(), store.clone(), options.probe_timeout);
        Self {
            sources: sources.into_iter().map(|base| SourceTier::new(base, fetch.clone(), clock.clone())).collect(),
            snapshot: SnapshotTier::new(store.clone()),
            mirror: mirror.map(|base| MirrorTier::new(base, fetch, clock)),
            availability,
            store,
            options,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn availability(&self) -> &AvailabilityTracker {
        &self.availability
    }

    /// A first-page query at the default page size.
    pub fn default_query(&self) -> PageQuery {
        PageQuery::new(1, self.options.default_per_page)
    }

    /// Fetch one page of records. Never fails; exhaustion yields an empty page.
    pub async fn fetch_page(&self, query: &PageQuery) -> PageResult {
        let query = query.clone().normalized();
        let key = match query.cache_key("page") {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(error = %e, "could not derive page cache key");
                None
            }
        };

        if !query.bypass_cache
            && let Some(key) = &key
            && let Some(mut cached) = self.store.get::<PageResult>(CacheFamily::ApiPages, key).await
        {
            tracing::debug!(page = query.page, records = cached.records.len(), "page cache hit");
            cached.origin = Origin::Cache;
            return cached;
        }

        if let Some(result) = self.fetch_live(&query).await {
            if let Some(key) = &key {
                self.store.set(CacheFamily::ApiPages, key, &result).await;
            }
            if query.fields.is_none() {
                snapshot::merge(&self.store, result.records.clone(), self.options.snapshot_cap).await;
            }
            self.signal(
                StatusLevel::Success,
                "source_ok",
                format!("{} records from {}", result.records.len(), result.source.as_deref().unwrap_or("source")),
            )
            .await;
            return result;
        }

        self.fetch_fallback(&query).await
    }

    /// Try the upstream sources. `None` when skipped or exhausted.
    async fn fetch_live(&self, query: &PageQuery) -> Option<PageResult> {
        if self.sources.is_empty() {
            return None;
        }

        if !query.bypass_cache
            && let Some(record) = self.availability.current().await
            && !record.available
        {
            tracing::info!(checked_at = %record.checked_at, "sources recently unavailable, skipping network");
            return None;
        }

        let tiers: Vec<&SourceTier> = self.sources.iter().collect();
        let mut cascade = cascade::run(&tiers, query).await;

        match cascade.winner.take() {
            Some((_, result)) => {
                self.availability.mark(true, result.source.clone(), None).await;
                Some(result)
            }
            None => {
                let summary = cascade.failure_summary();
                tracing::warn!(failures = %summary, "all sources failed");
                self.availability.mark(false, None, cascade.last_error().map(ToString::to_string)).await;
                self.signal(StatusLevel::Warning, "sources_failed", summary).await;
                None
            }
        }
    }

    async fn fetch_fallback(&self, query: &PageQuery) -> PageResult {
        let mut tiers: Vec<&dyn Tier> = vec![&self.snapshot];
        if let Some(mirror) = &self.mirror {
            tiers.push(mirror);
        }

        let cascade = cascade::run(&tiers, query).await;
        match cascade.winner {
            Some((_, result)) => {
                let kind = if result.origin == Origin::Mirror { "mirror_fallback" } else { "snapshot_fallback" };
                tracing::info!(origin = ?result.origin, records = result.records.len(), "serving degraded result");
                self.signal(
                    StatusLevel::Warning,
                    kind,
                    format!("served {} records from {}", result.records.len(), tiers_label(result.origin)),
                )
                .await;
                result
            }
            None => {
                self.signal(StatusLevel::Error, "all_tiers_failed", "no tier produced content".into()).await;
                PageResult::empty()
            }
        }
    }

    /// Fetch one page and convert it for display.
    ///
    /// Pages served from a live source or the page cache are cached again as
    /// converted posts; degraded pages are not.
    pub async fn list_posts(&self, query: &PageQuery) -> PostPage {
        let query = query.clone().normalized();
        let key = query.cache_key("posts").ok();

        if !query.bypass_cache
            && let Some(key) = &key
            && let Some(page) = self.store.get::<PostPage>(CacheFamily::Posts, key).await
        {
            tracing::debug!(page = query.page, "post cache hit");
            return page;
        }

        let result = self.fetch_page(&query).await;
        let page = PostPage {
            posts: to_posts(&result.records),
            total_pages: result.total_pages,
            total: result.total,
            origin: result.origin,
        };

        if matches!(result.origin, Origin::Source | Origin::Cache)
            && let Some(key) = &key
        {
            self.store.set(CacheFamily::Posts, key, &page).await;
        }
        page
    }

    /// Look up one post by slug across every tier.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` when no tier has the slug, `Error::InvalidInput` for
    /// a blank slug.
    pub async fn get_post_by_slug(&self, slug: &str) -> Result<Post, Error> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(Error::InvalidInput("slug must not be empty".into()));
        }

        let query = PageQuery::by_slug(slug).normalized();
        let result = self.fetch_page(&query).await;
        if let Some(post) = find_slug(&result, slug) {
            return Ok(post);
        }

        // A live answer without the slug leaves the fallback tiers untried.
        if matches!(result.origin, Origin::Source | Origin::Cache) {
            tracing::debug!(slug, origin = ?result.origin, "slug missing from live result, trying fallbacks");
            if let Some(post) = find_slug(&self.fetch_fallback(&query).await, slug) {
                return Ok(post);
            }
        }

        Err(Error::NotFound(format!("no post with slug {slug}")))
    }

    pub async fn snapshot(&self) -> LocalSyncSnapshot {
        snapshot::load(&self.store).await
    }

    pub async fn last_signal(&self) -> Option<StatusSignal> {
        self.store.get(CacheFamily::Status, STATUS_KEY).await
    }

    pub async fn status(&self) -> SyncStatus {
        let snapshot = self.snapshot().await;
        SyncStatus {
            availability: self.availability.current().await,
            last_signal: self.last_signal().await,
            snapshot_records: snapshot.len(),
            snapshot_updated_at: snapshot.updated_at,
            sources: self.sources.iter().map(|s| s.name().to_string()).collect(),
            mirror: self.mirror.as_ref().map(|m| m.label()),
        }
    }

    async fn signal(&self, status: StatusLevel, kind: &str, message: String) {
        match status {
            StatusLevel::Success => tracing::debug!(kind, %message, "sync status"),
            StatusLevel::Warning => tracing::warn!(kind, %message, "sync status"),
            StatusLevel::Error => tracing::error!(kind, %message, "sync status"),
        }
        let signal = StatusSignal { status, kind: kind.to_string(), message, timestamp: self.store.now() };
        self.store.set(CacheFamily::Status, STATUS_KEY, &signal).await;
    }
}

fn find_slug(result: &PageResult, slug: &str) -> Option<Post> {
    result.records.iter().find(|r| r.slug == slug).map(crate::convert::to_post)
}

fn tiers_label(origin: Origin) -> &'static str {
    match origin {
        Origin::Snapshot => "local snapshot",
        Origin::Mirror => "origin mirror",
        Origin::Source => "source",
        Origin::Cache => "cache",
        Origin::Empty => "nothing",
    }
}
