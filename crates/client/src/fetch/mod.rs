//! HTTP client for JSON content endpoints.
//!
//! ### Request rules
//! - Every request carries its own timeout; a timeout is `FETCH_TIMEOUT`
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### Response rules
//! - Non-2xx status is `HTTP_ERROR`
//! - A content type other than JSON is `BAD_CONTENT_TYPE`
//! - A body that does not parse is `MALFORMED_PAYLOAD`

pub mod url;

use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use serde_json::Value;
use std::time::{Duration, Instant};

pub use self::url::{UrlError, endpoint, parse_base};

use folio_core::Error;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "folio-sync/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Default request timeout (default: 15s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "folio-sync/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(15000),
            max_redirects: 5,
        }
    }
}

impl From<&folio_core::AppConfig> for FetchConfig {
    fn from(config: &folio_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// A decoded JSON response.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    /// The URL requested
    pub url: ::url::Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Parsed body
    pub value: Value,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl JsonResponse {
    /// Read an integer header such as `X-WP-Total`.
    pub fn header_u64(&self, name: &str) -> Option<u64> {
        self.headers.get(name)?.to_str().ok()?.trim().parse().ok()
    }
}

/// HTTP client for JSON APIs with size and content-type checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// GET `url` and decode a JSON body using the default timeout.
    pub async fn get_json(&self, url: &::url::Url) -> Result<JsonResponse, Error> {
        self.get_json_with_timeout(url, self.config.timeout).await
    }

    /// GET `url` and decode a JSON body, giving up after `timeout`.
    pub async fn get_json_with_timeout(&self, url: &::url::Url, timeout: Duration) -> Result<JsonResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url.as_str())
            .timeout(timeout)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| request_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("{url}: status {}", status.as_u16())));
        }

        let headers = response.headers().clone();
        check_json_content_type(url, &headers)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes)));
        }

        let bytes: Bytes = response.bytes().await.map_err(|e| request_error(url, timeout, e))?;
        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let value: Value =
            serde_json::from_slice(&bytes).map_err(|e| Error::MalformedPayload(format!("{url}: {e}")))?;

        let fetch_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(url = %url, status = status.as_u16(), fetch_ms, bytes = bytes.len(), "fetched json");

        Ok(JsonResponse { url: url.clone(), status, headers, value, fetch_ms })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn request_error(url: &::url::Url, timeout: Duration, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::FetchTimeout(format!("{url}: no response within {}ms", timeout.as_millis()))
    } else {
        Error::HttpError(format!("{url}: network error: {e}"))
    }
}

fn check_json_content_type(url: &::url::Url, headers: &header::HeaderMap) -> Result<(), Error> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mime = content_type.split(';').next().unwrap_or_default().trim();

    if mime == "application/json" || mime.ends_with("+json") {
        Ok(())
    } else {
        Err(Error::BadContentType(format!("{url}: got {:?}", if mime.is_empty() { "none" } else { mime })))
    }
}
