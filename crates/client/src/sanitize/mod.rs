//! Markup sanitizer for externally-authored posts.
//!
//! Reduces upstream HTML to a small allow-list of formatting tags
//! (`p`, `em`, `strong`, `h1`–`h6`, `blockquote`) through a fixed sequence of
//! passes. Later passes assume earlier ones already removed structural noise:
//!
//! 1. Vendor block delimiters (`<!-- wp:... -->`) and metadata comments
//! 2. Bracket shortcodes (`[caption ...]`, `[/gallery]`)
//! 3. Non-content subtrees (header, footer, nav, share/social blocks)
//! 4. Embedded media and scripts, including their content
//! 5. Structural containers collapsed, `br`/`hr` turned into newlines
//! 6. Every tag outside the allow-list stripped, attributes dropped
//! 7. Entities decoded, text re-escaped
//! 8. Whitespace normalized into blank-line separated lines
//!
//! The output is a fixed point: sanitizing it again returns it unchanged.

mod entities;

pub use entities::{decode as decode_entities, escape as escape_text, normalize as normalize_entities};

use regex::Regex;
use std::sync::LazyLock;

/// Tags that survive sanitization.
pub const ALLOWED_TAGS: &[&str] = &["p", "em", "strong", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote"];

/// Elements removed together with their content because they never hold prose.
const NON_CONTENT_TAGS: &[&str] = &["header", "footer", "nav", "form", "button"];

/// Class-name fragments marking navigation or sharing widgets.
const NON_CONTENT_CLASSES: &[&str] = &[
    "share",
    "sharing",
    "social",
    "sharedaddy",
    "jp-relatedposts",
    "related-posts",
    "nav-links",
    "navigation",
    "post-meta",
    "author-bio",
    "wp-block-buttons",
];

/// Media and executable elements, removed with their content.
const EMBED_TAGS: &[&str] = &[
    "img", "picture", "figure", "video", "audio", "source", "track", "iframe", "embed", "object", "svg", "canvas",
    "map", "script", "style", "noscript", "template",
];

/// Elements that never have a closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

static VENDOR_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--\s*/?wp:.*?-->|<!--\s*(?:more|nextpage|noteaser)\b.*?-->").expect("valid vendor regex")
});

static SHORTCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[/?[A-Za-z_][\w-]*(?:\s[^\[\]]*)?/?\]").expect("valid shortcode regex")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9:-]*)([^>]*)>").expect("valid tag regex"));

static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid class regex")
});

static CONTAINER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:div|section|article|aside|main|figcaption|center)\b[^>]*>").expect("valid container regex")
});

static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\b[^>]*>").expect("valid br regex"));

static RULE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<hr\b[^>]*>").expect("valid hr regex"));

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>").expect("valid comment regex"));

static ALLOWED_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?(?:p|em|strong|h[1-6]|blockquote)>").expect("valid allowed-tag regex")
});

static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid whitespace regex"));

static NEWLINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

/// Sanitize raw markup into the restricted allow-list subset.
pub fn sanitize(raw: &str) -> String {
    let html = strip_vendor_blocks(raw);
    let html = strip_shortcodes(&html);
    let html = remove_subtrees(&html, is_non_content);
    let html = remove_subtrees(&html, |name, _| EMBED_TAGS.contains(&name));
    let html = collapse_containers(&html);
    let html = strip_disallowed_tags(&html);
    let html = decode_and_escape(&html);
    let html = strip_shortcodes(&html);
    normalize_whitespace(&html)
}

/// Sanitize and then drop the remaining tags, leaving plain prose.
pub fn sanitize_inline(raw: &str) -> String {
    let sanitized = sanitize(raw);
    let text = ALLOWED_TAG_RE.replace_all(&sanitized, " ");
    normalize_whitespace(&text).replace("\n\n", " ")
}

fn strip_vendor_blocks(html: &str) -> String {
    VENDOR_BLOCK_RE.replace_all(html, "").into_owned()
}

/// Replace shortcodes with a space until none are left.
///
/// A space rather than nothing keeps the text on either side from fusing
/// into a new tag, entity or shortcode.
fn strip_shortcodes(html: &str) -> String {
    let mut current = html.to_string();
    loop {
        let next = SHORTCODE_RE.replace_all(&current, " ");
        if next == current {
            return current;
        }
        current = next.into_owned();
    }
}

#[derive(Debug)]
struct Tag<'a> {
    start: usize,
    end: usize,
    closing: bool,
    self_closing: bool,
    name: String,
    attrs: &'a str,
}

fn scan_tags(html: &str) -> Vec<Tag<'_>> {
    TAG_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let attrs = caps.get(3).map_or("", |m| m.as_str());
            Some(Tag {
                start: whole.start(),
                end: whole.end(),
                closing: !caps[1].is_empty(),
                self_closing: attrs.trim_end().ends_with('/'),
                name: caps[2].to_ascii_lowercase(),
                attrs,
            })
        })
        .collect()
}

fn is_non_content(name: &str, attrs: &str) -> bool {
    if NON_CONTENT_TAGS.contains(&name) {
        return true;
    }
    CLASS_ATTR_RE.captures(attrs).is_some_and(|caps| {
        let classes = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map_or(String::new(), |m| m.as_str().to_ascii_lowercase());
        NON_CONTENT_CLASSES.iter().any(|marker| classes.contains(marker))
    })
}

/// Index of the tag closing the element opened at `open`, honoring nesting.
fn matching_close(tags: &[Tag<'_>], open: usize) -> Option<usize> {
    let name = &tags[open].name;
    let mut depth = 0usize;
    for (i, tag) in tags.iter().enumerate().skip(open) {
        if tag.name != *name {
            continue;
        }
        if tag.closing {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        } else if !tag.self_closing {
            depth += 1;
        }
    }
    None
}

/// Remove every element matched by `is_target`, including its content.
///
/// Void and self-closing elements lose only the tag. An element whose close
/// tag never appears loses only its opening tag.
fn remove_subtrees(html: &str, is_target: impl Fn(&str, &str) -> bool) -> String {
    let tags = scan_tags(html);
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    for (i, tag) in tags.iter().enumerate() {
        if tag.start < cursor || tag.closing || !is_target(&tag.name, tag.attrs) {
            continue;
        }

        out.push_str(&html[cursor..tag.start]);
        cursor = if tag.self_closing || VOID_TAGS.contains(&tag.name.as_str()) {
            tag.end
        } else {
            matching_close(&tags, i).map_or(tag.end, |close| tags[close].end)
        };
    }

    out.push_str(&html[cursor..]);
    out
}

fn collapse_containers(html: &str) -> String {
    let html = CONTAINER_RE.replace_all(html, "\n");
    let html = LINE_BREAK_RE.replace_all(&html, "\n");
    RULE_RE.replace_all(&html, "\n\n").into_owned()
}

fn strip_disallowed_tags(html: &str) -> String {
    let html = COMMENT_RE.replace_all(html, "");
    TAG_RE
        .replace_all(&html, |caps: &regex::Captures<'_>| {
            let name = caps[2].to_ascii_lowercase();
            if ALLOWED_TAGS.contains(&name.as_str()) {
                format!("<{}{}>", &caps[1], name)
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Decode entities in text runs and escape them again, leaving allowed tags.
fn decode_and_escape(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for tag in ALLOWED_TAG_RE.find_iter(html) {
        out.push_str(&normalize_entities(&html[cursor..tag.start()]));
        out.push_str(tag.as_str());
        cursor = tag.end();
    }
    out.push_str(&normalize_entities(&html[cursor..]));
    out
}

fn normalize_whitespace(text: &str) -> String {
    let collapsed = HSPACE_RE.replace_all(text, " ");
    let collapsed = NEWLINES_RE.replace_all(&collapsed, "\n\n");
    collapsed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
