//! Conversion of validated records into display-ready posts.

use crate::sanitize::{sanitize, sanitize_inline};
use folio_core::{ContentRecord, Post};

/// Sanitize a record's markup for display.
///
/// Titles become plain inline text; body and excerpt keep the allow-listed
/// block formatting.
pub fn to_post(record: &ContentRecord) -> Post {
    Post {
        id: record.id,
        date: record.date,
        slug: record.slug.clone(),
        title: sanitize_inline(&record.title),
        body: sanitize(&record.body),
        excerpt: sanitize(&record.excerpt),
        categories: record.categories.clone(),
        tags: record.tags.clone(),
    }
}

pub fn to_posts(records: &[ContentRecord]) -> Vec<Post> {
    records.iter().map(to_post).collect()
}
