//! Schema validation for raw upstream records.
//!
//! [`validate`] never fails. A well-formed record comes back as
//! [`Validation::Valid`], one with recoverable gaps as
//! [`Validation::Repaired`] with the list of fixes applied, and anything that
//! is not a JSON object as [`Validation::Rejected`] carrying a synthesized
//! placeholder. Every variant yields a usable [`ContentRecord`].

use chrono::{DateTime, NaiveDateTime, Utc};
use folio_core::ContentRecord;
use scraper::Html;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Title given to records that arrive without one.
pub const UNTITLED: &str = "Untitled";

/// Words kept when an excerpt is derived from the body.
pub const EXCERPT_WORDS: usize = 55;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A single fix applied while validating a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairReason {
    MissingId,
    MissingTitle,
    MissingSlug,
    InvalidSlug,
    MissingDate,
    InvalidDate,
    MissingBody,
}

impl fmt::Display for RepairReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RepairReason::MissingId => "missing id",
            RepairReason::MissingTitle => "missing title",
            RepairReason::MissingSlug => "missing slug",
            RepairReason::InvalidSlug => "slug not url-safe",
            RepairReason::MissingDate => "missing date",
            RepairReason::InvalidDate => "unparseable date",
            RepairReason::MissingBody => "missing body",
        };
        f.write_str(text)
    }
}

/// Outcome of validating one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Valid(ContentRecord),
    Repaired { record: ContentRecord, reasons: Vec<RepairReason> },
    Rejected { placeholder: ContentRecord, reason: String },
}

impl Validation {
    pub fn record(&self) -> &ContentRecord {
        match self {
            Validation::Valid(record) | Validation::Repaired { record, .. } => record,
            Validation::Rejected { placeholder, .. } => placeholder,
        }
    }

    pub fn into_record(self) -> ContentRecord {
        match self {
            Validation::Valid(record) | Validation::Repaired { record, .. } => record,
            Validation::Rejected { placeholder, .. } => placeholder,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

/// Validate a raw record, repairing or replacing it as needed.
pub fn validate(raw: &Value, now: DateTime<Utc>) -> Validation {
    let Some(object) = raw.as_object() else {
        return Validation::Rejected {
            placeholder: placeholder(now),
            reason: format!("expected an object, got {}", kind_of(raw)),
        };
    };

    let mut reasons = Vec::new();

    let id = match object.get("id").and_then(as_id) {
        Some(id) => id,
        None => {
            reasons.push(RepairReason::MissingId);
            synthetic_id(now)
        }
    };

    let title = match rendered(object, "title") {
        Some(title) if !title.trim().is_empty() => title,
        _ => {
            reasons.push(RepairReason::MissingTitle);
            UNTITLED.to_string()
        }
    };

    let slug = match object.get("slug").and_then(Value::as_str).map(str::trim) {
        Some(slug) if is_url_safe(slug) => slug.to_string(),
        Some(slug) => match slugify(slug) {
            Some(clean) => {
                reasons.push(RepairReason::InvalidSlug);
                clean
            }
            None => {
                reasons.push(RepairReason::MissingSlug);
                synthetic_slug(now)
            }
        },
        None => {
            reasons.push(RepairReason::MissingSlug);
            synthetic_slug(now)
        }
    };

    let date = match first_present(object, &["date_gmt", "date"]) {
        Some(raw_date) => parse_timestamp(raw_date).unwrap_or_else(|| {
            reasons.push(RepairReason::InvalidDate);
            now
        }),
        None => {
            reasons.push(RepairReason::MissingDate);
            now
        }
    };

    let modified = first_present(object, &["modified_gmt", "modified"]).and_then(parse_timestamp);

    let body = match rendered(object, "content").or_else(|| rendered(object, "body")) {
        Some(body) => body,
        None => {
            reasons.push(RepairReason::MissingBody);
            String::new()
        }
    };

    let excerpt = match rendered(object, "excerpt") {
        Some(excerpt) if !excerpt.trim().is_empty() => excerpt,
        _ => derive_excerpt(&body),
    };

    let record = ContentRecord {
        id,
        date,
        modified,
        slug,
        title,
        body,
        excerpt,
        categories: id_list(object.get("categories")),
        tags: id_list(object.get("tags")),
    };

    if reasons.is_empty() { Validation::Valid(record) } else { Validation::Repaired { record, reasons } }
}

/// Validate every element of a JSON array payload.
///
/// Logs repaired and rejected records; the output has one record per input
/// element.
pub fn validate_all(items: &[Value], now: DateTime<Utc>) -> Vec<ContentRecord> {
    items
        .iter()
        .map(|raw| {
            let validation = validate(raw, now);
            match &validation {
                Validation::Valid(_) => {}
                Validation::Repaired { record, reasons } => {
                    let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
                    tracing::debug!(id = record.id, slug = %record.slug, ?reasons, "repaired record");
                }
                Validation::Rejected { placeholder, reason } => {
                    tracing::warn!(id = placeholder.id, %reason, "rejected record, using placeholder");
                }
            }
            validation.into_record()
        })
        .collect()
}

fn placeholder(now: DateTime<Utc>) -> ContentRecord {
    ContentRecord {
        id: synthetic_id(now),
        date: now,
        modified: None,
        slug: synthetic_slug(now),
        title: UNTITLED.to_string(),
        body: String::new(),
        excerpt: String::new(),
        categories: Vec::new(),
        tags: Vec::new(),
    }
}

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Negative so it never collides with an upstream id.
fn synthetic_id(now: DateTime<Utc>) -> i64 {
    let seq = (next_sequence() % 1000) as i64;
    -(now.timestamp_millis().saturating_mul(1000).saturating_add(seq)).max(1)
}

/// `post-<unix-millis>-<sequence>`
fn synthetic_slug(now: DateTime<Utc>) -> String {
    format!("post-{}-{}", now.timestamp_millis(), next_sequence())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read `field` either as `{ "rendered": "..." }` or as a plain string.
fn rendered(object: &Map<String, Value>, field: &str) -> Option<String> {
    match object.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Object(inner) => inner.get("rendered").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn first_present<'a>(object: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|field| object.get(*field).and_then(Value::as_str).filter(|s| !s.trim().is_empty()))
}

/// RFC 3339, or a zone-less `YYYY-MM-DDTHH:MM:SS` read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn is_url_safe(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '%' | '.') || (!c.is_ascii() && c.is_alphanumeric()))
}

fn slugify(raw: &str) -> Option<String> {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    (!slug.is_empty()).then_some(slug)
}

fn id_list(value: Option<&Value>) -> Vec<i64> {
    value.and_then(Value::as_array).map(|items| items.iter().filter_map(as_id).collect()).unwrap_or_default()
}

/// First [`EXCERPT_WORDS`] words of the body's text, with an ellipsis when cut.
pub fn derive_excerpt(body: &str) -> String {
    if body.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(body);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.len() > EXCERPT_WORDS {
        format!("{}\u{2026}", words[..EXCERPT_WORDS].join(" "))
    } else {
        words.join(" ")
    }
}
