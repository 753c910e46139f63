//! Content and bookkeeping records.
//!
//! [`ContentRecord`] is the validated shape of an upstream post, [`Post`] is
//! its sanitized, display-ready counterpart. The remaining types are what the
//! sync layer persists about itself.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A validated post as delivered by a content source.
///
/// `title`, `body` and `excerpt` still hold upstream markup; run them through
/// the sanitizer before display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentRecord {
    /// Upstream identifier, used as the merge key.
    pub id: i64,
    /// Publish timestamp.
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    /// URL-safe slug, never empty.
    pub slug: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    #[serde(default)]
    pub categories: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<i64>,
}

/// A display-ready post with sanitized markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Post {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub categories: Vec<i64>,
    pub tags: Vec<i64>,
}

/// Long-lived copy of every record ever fetched successfully.
///
/// Kept sorted newest-first. Entries are only replaced by a record with the
/// same id, never expired by age.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSyncSnapshot {
    pub records: Vec<ContentRecord>,
    /// Last merge time, diagnostics only.
    pub updated_at: Option<DateTime<Utc>>,
}

impl LocalSyncSnapshot {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Merge `incoming` into the snapshot.
    ///
    /// Incoming records replace stored ones with the same id; everything else
    /// is kept. The result is sorted by publish date descending (id descending
    /// on ties) and then truncated to `cap` records when a cap is given.
    pub fn merge(&mut self, incoming: Vec<ContentRecord>, cap: Option<usize>, now: DateTime<Utc>) {
        let mut by_id: HashMap<i64, ContentRecord> = self.records.drain(..).map(|r| (r.id, r)).collect();
        for record in incoming {
            by_id.insert(record.id, record);
        }

        let mut records: Vec<ContentRecord> = by_id.into_values().collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));

        if let Some(cap) = cap
            && records.len() > cap
        {
            records.truncate(cap);
        }

        self.records = records;
        self.updated_at = Some(now);
    }
}

/// Result of the most recent reachability check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AvailabilityRecord {
    pub available: bool,
    pub checked_at: DateTime<Utc>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Base URL that answered, when available.
    #[serde(default)]
    pub source: Option<String>,
}

/// Severity of a [`StatusSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Success,
    Warning,
    Error,
}

/// Diagnostic record written after every fetch outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusSignal {
    pub status: StatusLevel,
    /// Machine-readable outcome tag, e.g. `source_ok` or `snapshot_fallback`.
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
