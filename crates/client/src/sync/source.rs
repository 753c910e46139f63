//! Upstream content API tier.

use super::cascade::Tier;
use super::query::{Origin, PageQuery, PageResult};
use crate::fetch::{FetchClient, endpoint};
use crate::validate::validate_all;
use async_trait::async_trait;
use folio_core::{Clock, Error};
use std::sync::Arc;
use url::Url;

pub const TOTAL_HEADER: &str = "x-wp-total";
pub const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

/// One candidate base URL serving `GET {base}/posts`.
pub struct SourceTier {
    base: Url,
    label: String,
    fetch: Arc<FetchClient>,
    clock: Arc<dyn Clock>,
}

impl SourceTier {
    pub fn new(base: Url, fetch: Arc<FetchClient>, clock: Arc<dyn Clock>) -> Self {
        let label = base.as_str().trim_end_matches('/').to_string();
        Self { base, label, fetch, clock }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn list_url(&self, query: &PageQuery) -> Result<Url, Error> {
        endpoint(
            &self.base,
            "posts",
            [
                ("page", Some(query.page.to_string())),
                ("per_page", Some(query.per_page.to_string())),
                ("categories", query.category.map(|c| c.to_string())),
                ("tags", query.tag.map(|t| t.to_string())),
                ("search", query.search.clone()),
                ("slug", query.slug.clone()),
                ("_fields", query.fields_param()),
            ],
        )
        .map_err(|e| Error::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl Tier for SourceTier {
    fn name(&self) -> &str {
        &self.label
    }

    async fn attempt(&self, query: &PageQuery) -> Result<PageResult, Error> {
        let url = self.list_url(query)?;
        let response = self.fetch.get_json(&url).await?;

        let items = response
            .value
            .as_array()
            .ok_or_else(|| Error::MalformedPayload(format!("{url}: expected a JSON array of posts")))?;

        let records = validate_all(items, self.clock.now());

        let (total_pages, total) = match (response.header_u64(TOTAL_PAGES_HEADER), response.header_u64(TOTAL_HEADER)) {
            (Some(pages), Some(total)) => (pages, total),
            (pages, total) => {
                let (est_pages, est_total) = PageResult::estimate_totals(query, records.len(), None);
                (pages.unwrap_or(est_pages), total.unwrap_or(est_total))
            }
        };

        Ok(PageResult { records, total_pages, total, origin: Origin::Source, source: Some(self.label.clone()) })
    }
}
