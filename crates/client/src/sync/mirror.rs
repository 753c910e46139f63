//! Internal origin mirror tier.
//!
//! The mirror answers `GET {mirror}/api/posts` with `{ "posts": [...],
//! "hasMore": bool }` and `GET {mirror}/api/posts/{slug}` with a single post,
//! either bare or wrapped as `{ "post": {...} }`. Post objects have the same
//! shape as upstream records.

use super::cascade::Tier;
use super::query::{Origin, PageQuery, PageResult};
use crate::fetch::{FetchClient, endpoint};
use crate::validate::validate_all;
use async_trait::async_trait;
use folio_core::{Clock, Error};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub struct MirrorTier {
    base: Url,
    fetch: Arc<FetchClient>,
    clock: Arc<dyn Clock>,
}

impl MirrorTier {
    pub fn new(base: Url, fetch: Arc<FetchClient>, clock: Arc<dyn Clock>) -> Self {
        Self { base, fetch, clock }
    }

    fn invalid(e: impl std::fmt::Display) -> Error {
        Error::InvalidUrl(e.to_string())
    }

    async fn single(&self, slug: &str) -> Result<PageResult, Error> {
        let path = format!("api/posts/{}", encode_segment(slug));
        let url = endpoint(&self.base, &path, []).map_err(Self::invalid)?;
        let response = self.fetch.get_json(&url).await?;

        let post = match response.value {
            Value::Object(mut object) => match object.remove("post") {
                Some(inner @ Value::Object(_)) => inner,
                Some(Value::Null) => return Err(Error::NotFound(format!("mirror has no post {slug}"))),
                _ => Value::Object(object),
            },
            _ => return Err(Error::MalformedPayload(format!("{url}: expected a post object"))),
        };

        let records = validate_all(std::slice::from_ref(&post), self.clock.now());
        let total = records.len() as u64;
        Ok(PageResult { records, total_pages: total, total, origin: Origin::Mirror, source: Some(self.label()) })
    }

    async fn list(&self, query: &PageQuery) -> Result<PageResult, Error> {
        let url = endpoint(
            &self.base,
            "api/posts",
            [
                ("page", Some(query.page.to_string())),
                ("per_page", Some(query.per_page.to_string())),
                ("category", query.category.map(|c| c.to_string())),
                ("tag", query.tag.map(|t| t.to_string())),
                ("search", query.search.clone()),
            ],
        )
        .map_err(Self::invalid)?;
        let response = self.fetch.get_json(&url).await?;

        let posts = response
            .value
            .get("posts")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::MalformedPayload(format!("{url}: missing posts array")))?;
        let has_more = response.value.get("hasMore").and_then(Value::as_bool);

        let records = validate_all(posts, self.clock.now());
        let (total_pages, total) = PageResult::estimate_totals(query, records.len(), Some(has_more.unwrap_or(false)));

        Ok(PageResult { records, total_pages, total, origin: Origin::Mirror, source: Some(self.label()) })
    }

    /// Base URL without the trailing slash.
    pub fn label(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }
}

fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect::<String>().replace('+', "%20")
}

#[async_trait]
impl Tier for MirrorTier {
    fn name(&self) -> &str {
        "mirror"
    }

    async fn attempt(&self, query: &PageQuery) -> Result<PageResult, Error> {
        match &query.slug {
            Some(slug) => self.single(slug).await,
            None => self.list(query).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchConfig, parse_base};
    use folio_core::SystemClock;
    use httpmock::prelude::*;
    use serde_json::json;

    fn tier(server: &MockServer) -> MirrorTier {
        let fetch = Arc::new(FetchClient::new(FetchConfig::default()).unwrap());
        MirrorTier::new(parse_base(&server.base_url()).unwrap(), fetch, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_list_reads_posts_and_has_more() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/posts").query_param("page", "1").query_param("per_page", "2");
            then.status(200).header("content-type", "application/json").json_body(json!({
                "posts": [
                    { "id": 10, "slug": "m1", "title": "M1", "date": "2025-01-01T00:00:00Z" },
                    { "id": 11, "slug": "m2", "title": "M2", "date": "2025-01-01T00:00:00Z" }
                ],
                "hasMore": true
            }));
        });

        let result = tier(&server).attempt(&PageQuery::new(1, 2)).await.unwrap();
        mock.assert();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.origin, Origin::Mirror);
        assert!(result.is_fallback());
        assert_eq!((result.total_pages, result.total), (2, 3));
    }

    #[tokio::test]
    async fn test_single_by_slug() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/posts/first-light");
            then.status(200).header("content-type", "application/json").json_body(json!({ "post": { "id": 3, "slug": "first-light", "title": "First Light" } }));
        });

        let result = tier(&server).attempt(&PageQuery::by_slug("first-light")).await.unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].slug, "first-light");
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn test_single_bare_object() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/posts/bare");
            then.status(200).header("content-type", "application/json").json_body(json!({ "id": 4, "slug": "bare", "title": "Bare" }));
        });

        let result = tier(&server).attempt(&PageQuery::by_slug("bare")).await.unwrap();
        assert_eq!(result.records[0].id, 4);
    }

    #[tokio::test]
    async fn test_single_missing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/posts/gone");
            then.status(404).header("content-type", "application/json").json_body(json!({ "error": "not found" }));
        });

        let err = tier(&server).attempt(&PageQuery::by_slug("gone")).await.unwrap_err();
        assert!(matches!(err, Error::HttpError(_)));
    }

    #[tokio::test]
    async fn test_list_requires_posts_array() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/posts");
            then.status(200).header("content-type", "application/json").json_body(json!([]));
        });

        let err = tier(&server).attempt(&PageQuery::new(1, 10)).await.unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)));
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_segment("plain-slug"), "plain-slug");
    }
}
