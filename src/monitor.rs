//! Root scope owning the feed, the location tracker and their refresh loops.

use std::time::Duration;

use tracing::info;

use crate::feed::DisasterFeed;
use crate::geolocation::LocationTracker;
use crate::scheduler::PeriodicTask;

/// Owns both refresh loops. The loops are independent: the feed loop never
/// waits on the location loop or the reverse.
pub struct Monitor {
    feed: DisasterFeed,
    tracker: LocationTracker,
    tasks: Vec<PeriodicTask>,
}

impl Monitor {
    /// Start refreshing `feed` every `feed_period` and `tracker` every
    /// `location_period`. Both run once immediately.
    ///
    /// The location loop only runs when the tracker's provider is available.
    /// While it runs, each successful provider refresh replaces any fix the
    /// client reported in between.
    pub fn start(
        feed: DisasterFeed,
        tracker: LocationTracker,
        feed_period: Duration,
        location_period: Duration,
    ) -> Self {
        let feed_job = feed.clone();
        let feed_task = PeriodicTask::spawn("disaster-refresh", feed_period, move || {
            let feed = feed_job.clone();
            async move {
                feed.refresh().await;
            }
        });

        let mut tasks = vec![feed_task];

        if tracker.can_refresh() {
            let tracker_job = tracker.clone();
            tasks.push(PeriodicTask::spawn(
                "location-refresh",
                location_period,
                move || {
                    let tracker = tracker_job.clone();
                    async move {
                        // Failures are recorded in the tracker state.
                        let _ = tracker.refresh().await;
                    }
                },
            ));
        } else {
            info!("No location provider available, relying on reported locations");
        }

        Self {
            feed,
            tracker,
            tasks,
        }
    }

    pub fn feed(&self) -> &DisasterFeed {
        &self.feed
    }

    pub fn tracker(&self) -> &LocationTracker {
        &self.tracker
    }

    /// Stop every loop and wait for them to exit.
    pub async fn shutdown(self) {
        for task in self.tasks {
            task.stop().await;
        }
        info!("Monitor stopped");
    }
}
