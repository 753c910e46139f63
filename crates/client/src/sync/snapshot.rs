//! Local sync snapshot: reading, merging and serving it as a tier.

use super::cascade::Tier;
use super::query::{Origin, PageQuery, PageResult};
use async_trait::async_trait;
use folio_core::{CacheFamily, CacheStore, ContentRecord, Error, LocalSyncSnapshot};
use std::sync::Arc;

/// Key of the single snapshot value in the `local_sync` family.
pub const SNAPSHOT_KEY: &str = "snapshot";

pub async fn load(store: &CacheStore) -> LocalSyncSnapshot {
    store.get(CacheFamily::LocalSync, SNAPSHOT_KEY).await.unwrap_or_default()
}

/// Upsert `records` into the stored snapshot.
///
/// Returns the snapshot size after the merge, or `None` when the merge was
/// skipped because the stored value could not be read.
pub async fn merge(store: &CacheStore, records: Vec<ContentRecord>, cap: Option<usize>) -> Option<usize> {
    if records.is_empty() {
        return None;
    }
    let now = store.now();
    let merged = store
        .merge(CacheFamily::LocalSync, SNAPSHOT_KEY, |current: Option<LocalSyncSnapshot>| {
            let mut snapshot = current.unwrap_or_default();
            snapshot.merge(records, cap, now);
            snapshot
        })
        .await?;
    tracing::debug!(records = merged.len(), "local snapshot merged");
    Some(merged.len())
}

fn matches(record: &ContentRecord, query: &PageQuery) -> bool {
    if let Some(slug) = &query.slug
        && &record.slug != slug
    {
        return false;
    }
    if let Some(category) = query.category
        && !record.categories.contains(&category)
    {
        return false;
    }
    if let Some(tag) = query.tag
        && !record.tags.contains(&tag)
    {
        return false;
    }
    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        return [&record.title, &record.excerpt, &record.body].iter().any(|s| s.to_lowercase().contains(&needle));
    }
    true
}

/// Filter and paginate a snapshot in memory.
pub fn page_of(snapshot: &LocalSyncSnapshot, query: &PageQuery) -> PageResult {
    let matching: Vec<&ContentRecord> = snapshot.records.iter().filter(|r| matches(r, query)).collect();
    let total = matching.len() as u64;
    let per_page = u64::from(query.per_page.max(1));
    let records = matching.into_iter().skip(query.offset()).take(query.per_page as usize).cloned().collect();

    PageResult { records, total_pages: total.div_ceil(per_page), total, origin: Origin::Snapshot, source: None }
}

/// Serves pages from the stored snapshot when every source failed.
pub struct SnapshotTier {
    store: Arc<CacheStore>,
}

impl SnapshotTier {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tier for SnapshotTier {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn attempt(&self, query: &PageQuery) -> Result<PageResult, Error> {
        let snapshot = load(&self.store).await;
        if snapshot.is_empty() {
            return Err(Error::NotFound("local snapshot is empty".into()));
        }

        let page = page_of(&snapshot, query);
        if page.records.is_empty() {
            return Err(Error::NotFound(format!("no snapshot records for page {}", query.page)));
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use folio_core::{CacheDb, CachePolicy};

    fn record(id: i64, hours_ago: i64) -> ContentRecord {
        ContentRecord {
            id,
            date: Utc::now() - Duration::hours(hours_ago),
            modified: None,
            slug: format!("post-{id}"),
            title: format!("Post {id}"),
            body: if id % 2 == 0 { "even body".into() } else { "odd body".into() },
            excerpt: String::new(),
            categories: vec![id % 3],
            tags: vec![],
        }
    }

    async fn store() -> Arc<CacheStore> {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        Arc::new(CacheStore::new(db, CachePolicy::default()))
    }

    #[tokio::test]
    async fn test_merge_accumulates_and_caps() {
        let store = store().await;
        assert_eq!(merge(&store, (1..=4).map(|i| record(i, i)).collect(), Some(5)).await, Some(4));
        assert_eq!(merge(&store, (3..=8).map(|i| record(i, i)).collect(), Some(5)).await, Some(5));

        let snapshot = load(&store).await;
        let ids: Vec<i64> = snapshot.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(snapshot.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_merge_empty_is_noop() {
        let store = store().await;
        assert_eq!(merge(&store, Vec::new(), None).await, None);
        assert!(load(&store).await.is_empty());
    }

    #[test]
    fn test_page_of_filters_and_paginates() {
        let snapshot = LocalSyncSnapshot { records: (1..=12).map(|i| record(i, i)).collect(), updated_at: None };

        let first = page_of(&snapshot, &PageQuery::new(1, 10));
        assert_eq!(first.records.len(), 10);
        assert_eq!((first.total_pages, first.total), (2, 12));
        assert_eq!(first.records[0].id, 1);

        let second = page_of(&snapshot, &PageQuery::new(2, 10));
        assert_eq!(second.records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![11, 12]);

        let by_category = page_of(&snapshot, &PageQuery::new(1, 10).with_category(0));
        assert!(by_category.records.iter().all(|r| r.id % 3 == 0));
        assert_eq!(by_category.total, 4);

        let by_search = page_of(&snapshot, &PageQuery::new(1, 50).with_search("EVEN"));
        assert_eq!(by_search.total, 6);

        let by_slug = page_of(&snapshot, &PageQuery::by_slug("post-7"));
        assert_eq!(by_slug.records.len(), 1);
        assert_eq!(by_slug.records[0].id, 7);
    }

    #[tokio::test]
    async fn test_tier_fails_when_empty_or_unmatched() {
        let store = store().await;
        let tier = SnapshotTier::new(store.clone());
        assert!(matches!(tier.attempt(&PageQuery::new(1, 10)).await, Err(Error::NotFound(_))));

        merge(&store, vec![record(1, 1)], None).await;
        let page = tier.attempt(&PageQuery::new(1, 10)).await.unwrap();
        assert_eq!(page.origin, Origin::Snapshot);
        assert!(page.is_degraded());
        assert!(matches!(tier.attempt(&PageQuery::new(3, 10)).await, Err(Error::NotFound(_))));
    }
}
