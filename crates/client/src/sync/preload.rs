//! Background cache warmup.

use super::query::{Origin, PageQuery};
use super::{ContentSync, PREVIEW_FIELDS};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What [`Preloader::preload`] did.
#[derive(Debug)]
pub enum PreloadOutcome {
    /// The snapshot already had content; a refresh runs later on this task.
    Deferred(JoinHandle<()>),
    /// Nothing was stored yet, so the first page was fetched before returning.
    Warmed { records: usize, origin: Origin },
}

pub struct Preloader {
    sync: Arc<ContentSync>,
}

impl Preloader {
    pub fn new(sync: Arc<ContentSync>) -> Self {
        Self { sync }
    }

    /// Warm the cache. Never fails.
    ///
    /// With an existing snapshot this returns at once and schedules a light
    /// refresh after the configured delay. Otherwise it checks availability and
    /// fetches the first page inline.
    pub async fn preload(&self) -> PreloadOutcome {
        if !self.sync.snapshot().await.is_empty() {
            let sync = Arc::clone(&self.sync);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(sync.options().preload_delay).await;
                refresh_preview(&sync).await;
            });
            tracing::info!(delay_ms = self.sync.options().preload_delay.as_millis() as u64, "preload deferred");
            return PreloadOutcome::Deferred(handle);
        }

        let available = self.sync.availability().is_available().await;
        let result = self.sync.fetch_page(&self.sync.default_query()).await;
        tracing::info!(available, records = result.records.len(), origin = ?result.origin, "preload finished");
        PreloadOutcome::Warmed { records: result.records.len(), origin: result.origin }
    }
}

/// Check the sources with a title/excerpt-only page, then warm the first
/// listing page when they answered.
async fn refresh_preview(sync: &ContentSync) {
    if !sync.availability().is_available().await {
        tracing::info!("preload refresh skipped, sources unavailable");
        return;
    }
    let query = PageQuery::new(1, sync.options().preload_per_page).with_fields(PREVIEW_FIELDS).bypassing_cache();
    let preview = sync.fetch_page(&query).await;
    if preview.origin != Origin::Source {
        tracing::info!(origin = ?preview.origin, "preload refresh found no live source");
        return;
    }

    let listing = sync.list_posts(&sync.default_query()).await;
    tracing::info!(
        preview = preview.records.len(),
        posts = listing.posts.len(),
        origin = ?listing.origin,
        "preload refresh finished"
    );
}
