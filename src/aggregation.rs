//! Merging the upstream feeds into one ranked event list.
//!
//! The three feeds are fetched concurrently and independently: a feed that
//! fails contributes no events and is logged, and only the failure of every
//! enabled feed is reported as an error. The merged list is ranked by
//! severity, then recency, and capped at [`MAX_EVENTS`].

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::data_sources::{FirmsClient, NwsClient, UsgsClient};
use crate::model::{DisasterEvent, FeedSource};

/// Maximum number of events kept after ranking.
pub const MAX_EVENTS: usize = 10;

/// Error from a single upstream feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceError {
    pub source: FeedSource,
    pub message: String,
}

/// Result of one aggregation cycle.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Merged, ranked and truncated events.
    pub events: Vec<DisasterEvent>,

    /// Set only when no enabled feed could be read.
    pub error: Option<String>,

    /// Per-feed failures, in feed order.
    pub source_errors: Vec<SourceError>,
}

/// Fans out to every feed and merges the results.
#[derive(Clone)]
pub struct FeedAggregator {
    usgs: UsgsClient,
    nws: NwsClient,
    firms: Option<FirmsClient>,
    limit: usize,
}

impl FeedAggregator {
    /// Create an aggregator. FIRMS is optional because it needs a MAP_KEY.
    pub fn new(usgs: UsgsClient, nws: NwsClient, firms: Option<FirmsClient>) -> Self {
        Self {
            usgs,
            nws,
            firms,
            limit: MAX_EVENTS,
        }
    }

    /// Override the number of events kept after ranking.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Feeds that will be queried on each cycle.
    pub fn enabled_sources(&self) -> Vec<FeedSource> {
        let mut sources = vec![FeedSource::Usgs, FeedSource::Nws];
        if self.firms.is_some() {
            sources.push(FeedSource::Firms);
        }
        sources
    }

    /// Fetch every feed, merge, rank and truncate.
    ///
    /// Never fails: per-feed errors are collected in
    /// [`FetchOutcome::source_errors`], and [`FetchOutcome::error`] is set
    /// only when all enabled feeds failed.
    #[instrument(skip(self))]
    pub async fn fetch_disasters(&self) -> FetchOutcome {
        // Each feed runs on its own task so a panicking adapter is contained
        // like any other feed failure.
        let usgs = self.usgs.clone();
        let nws = self.nws.clone();
        let usgs_task = tokio::spawn(async move { usgs.fetch_events().await });
        let nws_task = tokio::spawn(async move { nws.fetch_events().await });
        let firms_task = self.firms.clone().map(|firms| {
            tokio::spawn(async move { firms.fetch_events().await })
        });

        let (usgs_result, nws_result, firms_result) = tokio::join!(
            settle(usgs_task),
            settle(nws_task),
            async {
                match firms_task {
                    Some(task) => Some(settle(task).await),
                    None => None,
                }
            },
        );

        let mut results = vec![
            (FeedSource::Usgs, usgs_result),
            (FeedSource::Nws, nws_result),
        ];
        if let Some(result) = firms_result {
            results.push((FeedSource::Firms, result));
        }

        let attempted = results.len();
        let mut all_events = Vec::new();
        let mut source_errors = Vec::new();

        for (source, result) in results {
            match result {
                Ok(events) => {
                    info!(source = %source, count = events.len(), "Feed fetched");
                    all_events.extend(events);
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Feed fetch failed");
                    source_errors.push(SourceError {
                        source,
                        message: e.to_string(),
                    });
                }
            }
        }

        let error = (source_errors.len() == attempted)
            .then(|| "Failed to fetch disaster data from every source".to_string());

        let events = rank_and_truncate(all_events, self.limit);

        info!(
            event_count = events.len(),
            failed_sources = source_errors.len(),
            "Disaster feeds aggregated"
        );

        FetchOutcome {
            events,
            error,
            source_errors,
        }
    }
}

/// Wait for a feed task, turning a panic or cancellation into an error.
async fn settle(
    task: JoinHandle<anyhow::Result<Vec<DisasterEvent>>>,
) -> anyhow::Result<Vec<DisasterEvent>> {
    task.await
        .map_err(|e| anyhow::anyhow!("feed task aborted: {}", e))?
}

/// Rank events by severity (highest first), then timestamp (newest first),
/// and keep the first `limit`.
///
/// The sort is stable: events that tie on both keys keep their incoming
/// (feed) order.
pub fn rank_and_truncate(mut events: Vec<DisasterEvent>, limit: usize) -> Vec<DisasterEvent> {
    events.sort_by(|a, b| {
        b.severity
            .rank()
            .cmp(&a.severity.rank())
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    events.truncate(limit);
    events
}
