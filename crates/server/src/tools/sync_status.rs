//! sync_status tool implementation.
//!
//! Reports availability, the last status signal, snapshot size and per-family
//! cache entry counts.

use super::json_result;
use chrono::{DateTime, Utc};
use folio_client::ContentSync;
use folio_core::{AvailabilityRecord, CacheFamily, StatusSignal};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output structure for sync_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncStatusOutput {
    /// Last availability probe, if still fresh.
    pub availability: Option<AvailabilityRecord>,
    /// Most recent fetch outcome.
    pub last_signal: Option<StatusSignal>,
    pub snapshot_records: usize,
    pub snapshot_updated_at: Option<DateTime<Utc>>,
    /// Configured source bases, in priority order.
    pub sources: Vec<String>,
    pub mirror: Option<String>,
    /// Stored entries per cache family, expired ones included.
    pub cache_entries: BTreeMap<String, u64>,
}

pub async fn status_impl(sync: &ContentSync) -> Result<CallToolResult, McpError> {
    let status = sync.status().await;

    let mut cache_entries = BTreeMap::new();
    for family in CacheFamily::ALL {
        cache_entries.insert(family.as_str().to_string(), sync.store().count_family(family).await?);
    }

    let output = SyncStatusOutput {
        availability: status.availability,
        last_signal: status.last_signal,
        snapshot_records: status.snapshot_records,
        snapshot_updated_at: status.snapshot_updated_at,
        sources: status.sources,
        mirror: status.mirror,
        cache_entries,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{offline_sync, parse_output, record};
    use folio_client::PageQuery;
    use folio_client::sync::snapshot;
    use folio_core::StatusLevel;

    #[tokio::test]
    async fn test_status_after_degraded_fetch() {
        let sync = offline_sync().await;
        snapshot::merge(sync.store(), vec![record(1, "a"), record(2, "b")], None).await;
        sync.fetch_page(&PageQuery::new(1, 10)).await;

        let output: SyncStatusOutput = parse_output(&status_impl(&sync).await.unwrap());

        assert_eq!(output.snapshot_records, 2);
        assert!(output.snapshot_updated_at.is_some());
        let signal = output.last_signal.expect("signal written");
        assert_eq!(signal.status, StatusLevel::Warning);
        assert_eq!(signal.kind, "snapshot_fallback");
        assert_eq!(output.cache_entries.get("local_sync"), Some(&1));
        assert_eq!(output.cache_entries.get("status"), Some(&1));
        assert_eq!(output.cache_entries.len(), CacheFamily::ALL.len());
        assert!(output.sources.is_empty());
    }

    #[tokio::test]
    async fn test_status_fresh_install() {
        let sync = offline_sync().await;
        let output: SyncStatusOutput = parse_output(&status_impl(&sync).await.unwrap());
        assert!(output.availability.is_none());
        assert!(output.last_signal.is_none());
        assert_eq!(output.snapshot_records, 0);
        assert!(output.cache_entries.values().all(|&n| n == 0));
    }
}
