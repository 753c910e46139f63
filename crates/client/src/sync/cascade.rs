//! Ordered tier attempts.
//!
//! A [`Tier`] is one place a page can come from. [`run`] tries tiers strictly
//! in order, each at most once, and stops at the first success. Failures are
//! collected rather than raised so the caller decides what exhaustion means.

use super::query::{PageQuery, PageResult};
use async_trait::async_trait;
use folio_core::Error;

#[async_trait]
pub trait Tier: Send + Sync {
    /// Short label used in logs and status signals.
    fn name(&self) -> &str;

    async fn attempt(&self, query: &PageQuery) -> Result<PageResult, Error>;
}

/// What happened across one pass over the tiers.
#[derive(Debug)]
pub struct Cascade {
    /// Winning tier's position and result.
    pub winner: Option<(usize, PageResult)>,
    /// Tiers that failed before the winner, in attempt order.
    pub failures: Vec<(String, Error)>,
}

impl Cascade {
    pub fn last_error(&self) -> Option<&Error> {
        self.failures.last().map(|(_, e)| e)
    }

    pub fn failure_summary(&self) -> String {
        self.failures.iter().map(|(name, e)| format!("{name}: {e}")).collect::<Vec<_>>().join("; ")
    }
}

pub async fn run<T: Tier + ?Sized>(tiers: &[&T], query: &PageQuery) -> Cascade {
    let mut failures = Vec::new();

    for (index, tier) in tiers.iter().enumerate() {
        match tier.attempt(query).await {
            Ok(result) => {
                tracing::debug!(tier = tier.name(), records = result.records.len(), "tier answered");
                return Cascade { winner: Some((index, result)), failures };
            }
            Err(e) => {
                tracing::warn!(tier = tier.name(), error = %e, transient = e.is_transient(), "tier failed");
                failures.push((tier.name().to_string(), e));
            }
        }
    }

    Cascade { winner: None, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::query::Origin;
    use std::sync::Mutex;

    struct FakeTier {
        name: String,
        succeed: bool,
        log: std::sync::Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Tier for FakeTier {
        fn name(&self) -> &str {
            &self.name
        }

        async fn attempt(&self, _query: &PageQuery) -> Result<PageResult, Error> {
            self.log.lock().unwrap().push(self.name.clone());
            if self.succeed {
                Ok(PageResult { source: Some(self.name.clone()), origin: Origin::Source, ..PageResult::empty() })
            } else {
                Err(Error::HttpError(format!("{} down", self.name)))
            }
        }
    }

    fn tiers(outcomes: &[bool]) -> (Vec<FakeTier>, std::sync::Arc<Mutex<Vec<String>>>) {
        let log = std::sync::Arc::new(Mutex::new(Vec::new()));
        let tiers = outcomes
            .iter()
            .enumerate()
            .map(|(i, &succeed)| FakeTier { name: format!("t{}", i + 1), succeed, log: log.clone() })
            .collect();
        (tiers, log)
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let (tiers, log) = tiers(&[false, false, true, true]);
        let refs: Vec<&FakeTier> = tiers.iter().collect();

        let cascade = run(&refs, &PageQuery::new(1, 10)).await;

        let (index, result) = cascade.winner.expect("third tier answers");
        assert_eq!(index, 2);
        assert_eq!(result.source.as_deref(), Some("t3"));
        assert_eq!(*log.lock().unwrap(), vec!["t1", "t2", "t3"]);
        assert_eq!(cascade.failures.len(), 2);
        assert_eq!(cascade.failures[0].0, "t1");
    }

    #[tokio::test]
    async fn test_exhaustion_attempts_each_once() {
        let (tiers, log) = tiers(&[false, false, false]);
        let refs: Vec<&FakeTier> = tiers.iter().collect();

        let cascade = run(&refs, &PageQuery::new(1, 10)).await;

        assert!(cascade.winner.is_none());
        assert_eq!(*log.lock().unwrap(), vec!["t1", "t2", "t3"]);
        assert!(matches!(cascade.last_error(), Some(Error::HttpError(msg)) if msg == "t3 down"));
        assert!(cascade.failure_summary().starts_with("t1: HTTP_ERROR: t1 down"));
    }

    #[tokio::test]
    async fn test_no_tiers() {
        let refs: Vec<&FakeTier> = Vec::new();
        let cascade = run(&refs, &PageQuery::new(1, 10)).await;
        assert!(cascade.winner.is_none());
        assert!(cascade.failures.is_empty());
    }

    #[tokio::test]
    async fn test_dyn_tiers() {
        let (tiers, log) = tiers(&[false, true]);
        let refs: Vec<&dyn Tier> = tiers.iter().map(|t| t as &dyn Tier).collect();
        let cascade = run(&refs, &PageQuery::new(1, 10)).await;
        assert_eq!(cascade.winner.map(|(i, _)| i), Some(1));
        assert_eq!(log.lock().unwrap().len(), 2);
    }
}
