//! Consumer-facing disaster feed state.
//!
//! [`DisasterFeed`] holds the latest aggregation result behind a lock and
//! replaces it wholesale on every refresh, so readers always see one
//! complete, immutable event list.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::aggregation::{FeedAggregator, FetchOutcome};
use crate::model::{Coordinates, DisasterEvent, FeedResponse, NearbyDisaster};
use crate::proximity::proximity_filter;

/// Point-in-time view of the feed.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub events: Arc<[DisasterEvent]>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<FeedSnapshot> for FeedResponse {
    fn from(snapshot: FeedSnapshot) -> Self {
        Self {
            disasters: snapshot.events.to_vec(),
            loading: snapshot.loading,
            error: snapshot.error,
            last_updated: snapshot.last_updated,
        }
    }
}

#[derive(Debug, Default)]
struct FeedState {
    events: Arc<[DisasterEvent]>,
    error: Option<String>,
    last_updated: Option<DateTime<Utc>>,
    /// Sequence number of the refresh that last wrote this state.
    published: u64,
}

/// Latest merged disaster list plus its loading and error flags.
#[derive(Clone)]
pub struct DisasterFeed {
    aggregator: FeedAggregator,
    state: Arc<RwLock<FeedState>>,
    in_flight: Arc<AtomicUsize>,
    started: Arc<AtomicU64>,
}

impl DisasterFeed {
    pub fn new(aggregator: FeedAggregator) -> Self {
        Self {
            aggregator,
            state: Arc::new(RwLock::new(FeedState::default())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a refresh is currently running.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Current event list and status flags.
    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.read().await;
        FeedSnapshot {
            events: Arc::clone(&state.events),
            loading: self.is_loading(),
            error: state.error.clone(),
            last_updated: state.last_updated,
        }
    }

    /// Re-fetch every feed and publish the result.
    ///
    /// If every feed failed, the previous event list is kept and the error
    /// is set. Any successful cycle clears the error.
    ///
    /// Overlapping refreshes (a manual one during a scheduled one) publish in
    /// start order: a refresh that finishes after a later-started one has
    /// already published is discarded.
    pub async fn refresh(&self) -> FeedSnapshot {
        let guard = InFlightGuard::enter(&self.in_flight);
        let ticket = self.started.fetch_add(1, Ordering::SeqCst) + 1;

        let outcome = self.aggregator.fetch_disasters().await;

        {
            let mut state = self.state.write().await;
            if ticket < state.published {
                debug!(
                    ticket,
                    published = state.published,
                    "Discarding refresh overtaken by a newer one"
                );
            } else {
                state.published = ticket;
                apply(&mut state, outcome);
            }
        }

        drop(guard);
        self.snapshot().await
    }

    /// Events within `radius_km` of `origin`, nearest first.
    ///
    /// Operates on the already-truncated list.
    pub async fn nearby(&self, origin: Coordinates, radius_km: f64) -> Vec<NearbyDisaster> {
        let events = Arc::clone(&self.state.read().await.events);
        proximity_filter(&events, origin, radius_km)
    }
}

/// Publish one aggregation result.
fn apply(state: &mut FeedState, outcome: FetchOutcome) {
    match outcome.error {
        Some(error) => {
            warn!(
                error = %error,
                retained = state.events.len(),
                "Disaster refresh failed, keeping previous events"
            );
            state.error = Some(error);
        }
        None => {
            info!(event_count = outcome.events.len(), "Disaster feed refreshed");
            state.events = outcome.events.into();
            state.error = None;
            state.last_updated = Some(Utc::now());
        }
    }
}

/// Counts a refresh as in flight until dropped, including on cancellation.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_sources::{NwsClient, UsgsClient};
    use axum::{Router, routing::get};

    const DEAD_URL: &str = "http://127.0.0.1:1";

    const QUAKES: &str = r#"{
        "features": [
            {
                "id": "near",
                "properties": { "mag": 4.2, "place": "Near origin", "time": 1701500000000, "title": "M 4.2" },
                "geometry": { "coordinates": [0.5, 0.5, 10.0] }
            },
            {
                "id": "far",
                "properties": { "mag": 7.1, "place": "Far away", "time": 1701500000000, "title": "M 7.1" },
                "geometry": { "coordinates": [90.0, 40.0, 10.0] }
            }
        ]
    }"#;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn quake_feed() -> DisasterFeed {
        let app = Router::new().route(
            "/summary/significant_day.geojson",
            get(|| async { ([("content-type", "application/json")], QUAKES) }),
        );
        let usgs_url = serve(app).await;

        DisasterFeed::new(FeedAggregator::new(
            UsgsClient::with_base_url(&usgs_url),
            NwsClient::with_base_url(DEAD_URL),
            None,
        ))
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_empty() {
        let feed = DisasterFeed::new(FeedAggregator::new(
            UsgsClient::with_base_url(DEAD_URL),
            NwsClient::with_base_url(DEAD_URL),
            None,
        ));

        let snapshot = feed.snapshot().await;

        assert!(snapshot.events.is_empty());
        assert!(!snapshot.loading);
        assert!(snapshot.error.is_none());
        assert!(snapshot.last_updated.is_none());
    }

    #[tokio::test]
    async fn test_refresh_publishes_ranked_events() {
        let feed = quake_feed().await;

        let snapshot = feed.refresh().await;

        assert_eq!(snapshot.events.len(), 2);
        assert_eq!(snapshot.events[0].id, "usgs:far");
        assert!(snapshot.error.is_none());
        assert!(snapshot.last_updated.is_some());
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn test_total_failure_sets_error() {
        let feed = DisasterFeed::new(FeedAggregator::new(
            UsgsClient::with_base_url(DEAD_URL),
            NwsClient::with_base_url(DEAD_URL),
            None,
        ));

        let snapshot = feed.refresh().await;

        assert!(snapshot.events.is_empty());
        assert!(snapshot.error.is_some());
    }

    #[tokio::test]
    async fn test_total_failure_keeps_previous_events() {
        use std::sync::atomic::AtomicBool;

        let failing = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&failing);
        let app = Router::new().route(
            "/summary/significant_day.geojson",
            get(move || {
                let failing = flag.load(Ordering::SeqCst);
                async move {
                    if failing {
                        Err(axum::http::StatusCode::BAD_GATEWAY)
                    } else {
                        Ok(([("content-type", "application/json")], QUAKES))
                    }
                }
            }),
        );
        let usgs_url = serve(app).await;
        let feed = DisasterFeed::new(FeedAggregator::new(
            UsgsClient::with_base_url(&usgs_url),
            NwsClient::with_base_url(DEAD_URL),
            None,
        ));

        let first = feed.refresh().await;
        assert_eq!(first.events.len(), 2);

        failing.store(true, Ordering::SeqCst);
        let second = feed.refresh().await;

        assert!(second.error.is_some());
        assert_eq!(second.events.len(), 2);
        assert_eq!(second.last_updated, first.last_updated);

        failing.store(false, Ordering::SeqCst);
        let third = feed.refresh().await;
        assert!(third.error.is_none());
    }

    #[tokio::test]
    async fn test_slow_refresh_does_not_overwrite_newer_result() {
        const STALE: &str = r#"{
            "features": [
                {
                    "id": "stale",
                    "properties": { "mag": 5.0, "place": "Old", "time": 1701400000000, "title": "M 5.0" },
                    "geometry": { "coordinates": [1.0, 1.0, 10.0] }
                }
            ]
        }"#;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let app = Router::new().route(
            "/summary/significant_day.geojson",
            get(move || {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                        ([("content-type", "application/json")], STALE)
                    } else {
                        ([("content-type", "application/json")], QUAKES)
                    }
                }
            }),
        );
        let usgs_url = serve(app).await;
        let feed = DisasterFeed::new(FeedAggregator::new(
            UsgsClient::with_base_url(&usgs_url),
            NwsClient::with_base_url(DEAD_URL),
            None,
        ));

        let slow = tokio::spawn({
            let feed = feed.clone();
            async move { feed.refresh().await }
        });
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let fast = feed.refresh().await;
        assert_eq!(fast.events.len(), 2);

        let after_slow = slow.await.unwrap();
        assert_eq!(after_slow.events.len(), 2);
        assert!(after_slow.events.iter().all(|e| e.id != "usgs:stale"));
        assert_eq!(after_slow.last_updated, fast.last_updated);
    }

    #[tokio::test]
    async fn test_nearby_uses_current_events() {
        let feed = quake_feed().await;
        feed.refresh().await;

        let origin = Coordinates::new(0.0, 0.0).unwrap();
        let nearby = feed.nearby(origin, 500.0).await;

        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].event.id, "usgs:near");
        assert!(nearby[0].distance_km < 100.0);
    }

    #[test]
    fn test_in_flight_guard() {
        let counter = AtomicUsize::new(0);
        {
            let _a = InFlightGuard::enter(&counter);
            let _b = InFlightGuard::enter(&counter);
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
