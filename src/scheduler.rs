//! Cancellable periodic tasks.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to a job that runs immediately and then on a fixed period.
///
/// Stopping (or dropping) the handle cancels the loop. A run that is in
/// flight at that moment is abandoned: its future is dropped and nothing it
/// would have produced is applied.
pub struct PeriodicTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `job` on the runtime, first right away and then every `period`.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // A slow run delays the next one rather than triggering a burst.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                debug!(task = name, "Periodic task running");

                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(task = name, "Periodic task cancelled mid-run");
                        break;
                    }
                    _ = job() => {}
                }
            }
        });

        info!(task = name, period_secs = period.as_secs(), "Periodic task started");

        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the loop and wait for its task to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!(task = self.name, "Periodic task stopped");
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
