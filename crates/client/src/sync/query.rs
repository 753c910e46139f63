//! Request and result shapes for paged content fetches.

use folio_core::cache::compute_cache_key;
use folio_core::{ContentRecord, Error};
use serde::{Deserialize, Serialize};

/// Largest page size any tier is asked for.
pub const MAX_PER_PAGE: u32 = 100;

/// Parameters of one paged listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Restrict upstream responses to these record fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Skip cache reads and the availability short-circuit. Not part of the
    /// cache key.
    #[serde(skip)]
    pub bypass_cache: bool,
}

impl PageQuery {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page, category: None, tag: None, search: None, slug: None, fields: None, bypass_cache: false }
    }

    /// Single-record lookup by slug.
    pub fn by_slug(slug: impl Into<String>) -> Self {
        Self { slug: Some(slug.into()), ..Self::new(1, 1) }
    }

    pub fn with_category(mut self, category: i64) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_tag(mut self, tag: i64) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    /// Clamp paging into range and drop blank filters.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        self.search = self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.slug = self.slug.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self
    }

    /// Deterministic key for this request within `namespace`.
    pub fn cache_key(&self, namespace: &str) -> Result<String, Error> {
        compute_cache_key(namespace, self)
    }

    /// Comma-joined `_fields` value for upstream requests.
    pub fn fields_param(&self) -> Option<String> {
        self.fields.as_ref().filter(|f| !f.is_empty()).map(|f| f.join(","))
    }

    /// Zero-based offset of the first record on this page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize)
    }
}

/// Which tier produced a [`PageResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Source,
    Cache,
    Snapshot,
    Mirror,
    Empty,
}

/// One page of validated records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub records: Vec<ContentRecord>,
    pub total_pages: u64,
    pub total: u64,
    pub origin: Origin,
    /// Base URL of the tier that answered, when it was a network tier.
    #[serde(default)]
    pub source: Option<String>,
}

impl PageResult {
    /// The terminal result when every tier failed.
    pub fn empty() -> Self {
        Self { records: Vec::new(), total_pages: 0, total: 0, origin: Origin::Empty, source: None }
    }

    /// Served from the local snapshot or the mirror instead of a live source.
    pub fn is_degraded(&self) -> bool {
        matches!(self.origin, Origin::Snapshot | Origin::Mirror)
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == Origin::Mirror
    }

    /// Estimate totals from a page's shape when the tier reports none.
    ///
    /// A full page implies at least one more page.
    pub fn estimate_totals(query: &PageQuery, returned: usize, has_more: Option<bool>) -> (u64, u64) {
        let seen = (query.offset() + returned) as u64;
        if seen == 0 {
            return (0, 0);
        }
        let page = u64::from(query.page);
        let more = has_more.unwrap_or(returned >= query.per_page as usize);
        if more { (page + 1, seen + 1) } else { (page, seen) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_clamps() {
        let query = PageQuery { search: Some("   ".into()), ..PageQuery::new(0, 500) }.normalized();
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, MAX_PER_PAGE);
        assert_eq!(query.search, None);
    }

    #[test]
    fn test_cache_key_ignores_bypass_flag() {
        let plain = PageQuery::new(2, 10).with_category(4);
        let bypass = plain.clone().bypassing_cache();
        assert_eq!(plain.cache_key("page").unwrap(), bypass.cache_key("page").unwrap());
    }

    #[test]
    fn test_cache_key_varies_with_filters() {
        let a = PageQuery::new(1, 10).with_tag(3).cache_key("page").unwrap();
        let b = PageQuery::new(1, 10).with_tag(4).cache_key("page").unwrap();
        let c = PageQuery::new(1, 10).with_tag(3).cache_key("posts").unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fields_param() {
        assert_eq!(PageQuery::new(1, 5).fields_param(), None);
        let query = PageQuery::new(1, 5).with_fields(&["id", "slug"]);
        assert_eq!(query.fields_param().as_deref(), Some("id,slug"));
    }

    #[test]
    fn test_estimate_totals() {
        let query = PageQuery::new(2, 10);
        assert_eq!(PageResult::estimate_totals(&query, 10, None), (3, 21));
        assert_eq!(PageResult::estimate_totals(&query, 4, None), (2, 14));
        assert_eq!(PageResult::estimate_totals(&query, 10, Some(false)), (2, 20));
        assert_eq!(PageResult::estimate_totals(&PageQuery::new(1, 10), 0, None), (0, 0));
    }

    #[test]
    fn test_empty_result() {
        let empty = PageResult::empty();
        assert!(empty.records.is_empty());
        assert_eq!((empty.total_pages, empty.total), (0, 0));
        assert!(!empty.is_degraded());
    }
}
