use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::Tracker;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Drives check cycles on a fixed interval until cancelled.
///
/// The first tick fires immediately so a freshly started process checks right away. Ticks that
/// land while another cycle holds the tracker (for instance an on-demand check) are dropped
/// rather than queued behind it.
#[derive(Debug)]
pub struct Scheduler {
    tracker: Arc<Tracker>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(tracker: Arc<Tracker>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            tracker,
            interval,
            shutdown,
        }
    }

    #[instrument(skip(self), fields(interval_secs = self.interval.as_secs()))]
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("starting periodic checks");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("scheduler shutting down");
                    break;
                }

                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    async fn tick(&self) {
        match self.tracker.try_run_cycle().await {
            Some(report) => tracing::debug!(
                fetched = report.fetched,
                achievements = report.achievements.len(),
                chunks = report.chunks.len(),
                "scheduled cycle complete"
            ),
            None => tracing::debug!("cycle already in flight, skipping tick"),
        }
    }
}

#[cfg(test)]
mod test {
    use wiremock::MockServer;

    use super::*;
    use crate::announce::DryRunDispatcher;
    use crate::sync::test::{harness, mount_sample};

    #[tokio::test]
    async fn test_ticks_until_cancelled() {
        let server = MockServer::start().await;
        mount_sample(&server).await;

        let dispatcher = Arc::new(DryRunDispatcher::new());
        let h = harness(&server.uri(), dispatcher.clone(), 1900, Some(0)).await;

        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(h.tracker.clone(), Duration::from_millis(50), shutdown.clone());
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(220)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests.len() >= 2, "only {} cycles ran", requests.len());

        // later cycles start from the advanced checkpoint, past every star in the body
        assert_eq!(dispatcher.sent().await.len(), 1);

        let settled = requests.len();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(server.received_requests().await.unwrap().len(), settled);
    }
}
