//! Base URL handling for content endpoints.

use url::Url;

/// Error type for base URL failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Parse a configured API base into a joinable form.
///
/// - Trim whitespace, default the scheme to `https`
/// - Only http(s) is accepted
/// - Drop query and fragment
/// - Ensure the path ends with `/` so relative joins stay under the base
pub fn parse_base(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let with_scheme = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };
    let mut base = Url::parse(&with_scheme).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match base.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    base.set_query(None);
    base.set_fragment(None);
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    Ok(base)
}

/// Build `{base}/{path}?{params}`, skipping parameters without a value.
pub fn endpoint<'a>(
    base: &Url, path: &str, params: impl IntoIterator<Item = (&'a str, Option<String>)>,
) -> Result<Url, UrlError> {
    let mut url = base.join(path.trim_start_matches('/')).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in params {
            if let Some(value) = value {
                pairs.append_pair(name, &value);
            }
        }
    }
    if url.query() == Some("") {
        url.set_query(None);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_appends_slash() {
        let base = parse_base("https://blog.example/wp-json/wp/v2").unwrap();
        assert_eq!(base.as_str(), "https://blog.example/wp-json/wp/v2/");
    }

    #[test]
    fn test_parse_base_default_scheme() {
        let base = parse_base("blog.example").unwrap();
        assert_eq!(base.as_str(), "https://blog.example/");
    }

    #[test]
    fn test_parse_base_drops_query_and_fragment() {
        let base = parse_base("  http://Blog.Example/api?x=1#top ").unwrap();
        assert_eq!(base.as_str(), "http://blog.example/api/");
    }

    #[test]
    fn test_parse_base_rejects_scheme() {
        assert!(matches!(parse_base("ftp://blog.example"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_parse_base_empty() {
        assert!(matches!(parse_base("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_endpoint_joins_under_base() {
        let base = parse_base("https://blog.example/wp-json/wp/v2").unwrap();
        let url = endpoint(&base, "/posts", [("page", Some("2".into())), ("search", None)]).unwrap();
        assert_eq!(url.as_str(), "https://blog.example/wp-json/wp/v2/posts?page=2");
    }

    #[test]
    fn test_endpoint_encodes_values() {
        let base = parse_base("https://blog.example/").unwrap();
        let url = endpoint(&base, "api/posts", [("search", Some("dark & stormy".into()))]).unwrap();
        assert_eq!(url.query(), Some("search=dark+%26+stormy"));
    }

    #[test]
    fn test_endpoint_without_params() {
        let base = parse_base("https://blog.example/").unwrap();
        let url = endpoint(&base, "api/posts/first-light", []).unwrap();
        assert_eq!(url.as_str(), "https://blog.example/api/posts/first-light");
    }
}
