pub mod scheduler;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::instrument;

use crate::announce::{Delivery, Dispatcher, chunk_messages};
use crate::leaderboard::client::{FetchResult, LeaderboardClient};
use crate::leaderboard::diff::diff;
use crate::leaderboard::render::render;
use crate::leaderboard::Achievement;
use crate::store::CheckpointStore;
use crate::util::clock::{Clock, puzzle_day};

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    /// Event year, used for the summary title and day truncation
    pub year: i32,

    /// Handle passed to the dispatcher for every announcement
    pub channel: String,

    /// Upper bound on the length of a single dispatched message, in chars
    pub message_budget: usize,
}

/// Runs check cycles and summaries against one leaderboard.
///
/// A cycle holds `cycle` for its whole duration, so two cycles can never read the same checkpoint.
/// Summaries only read through the cache and queue on their own lock, so an on-demand request
/// never makes a scheduled tick skip.
#[derive(Debug)]
pub struct Tracker {
    client: LeaderboardClient,
    checkpoints: CheckpointStore,
    dispatcher: Arc<dyn Dispatcher>,
    clock: Arc<dyn Clock>,
    settings: TrackerSettings,

    cycle: Mutex<CycleState>,
    summary: Mutex<()>,
    last_check: AtomicI64,
}

#[derive(Debug, Default)]
struct CycleState {
    /// Checkpoint that was advanced in memory but couldn't be persisted
    unsaved_checkpoint: Option<i64>,
}

impl Tracker {
    pub async fn new(
        client: LeaderboardClient,
        checkpoints: CheckpointStore,
        dispatcher: Arc<dyn Dispatcher>,
        clock: Arc<dyn Clock>,
        settings: TrackerSettings,
    ) -> Self {
        let last_check = AtomicI64::new(checkpoints.read().await);

        Self {
            client,
            checkpoints,
            dispatcher,
            clock,
            settings,
            cycle: Mutex::new(CycleState::default()),
            summary: Mutex::new(()),
            last_check,
        }
    }

    /// Runs a check cycle, waiting for any cycle already in flight to finish first
    pub async fn run_cycle(&self) -> CycleReport {
        let mut state = self.cycle.lock().await;
        self.run_locked(&mut state).await
    }

    /// Runs a check cycle unless one is already in flight, in which case `None` is returned
    pub async fn try_run_cycle(&self) -> Option<CycleReport> {
        let mut state = self.cycle.try_lock().ok()?;
        Some(self.run_locked(&mut state).await)
    }

    #[instrument(skip_all)]
    async fn run_locked(&self, state: &mut MutexGuard<'_, CycleState>) -> CycleReport {
        tracing::info!("checking for new stars");

        let snapshot = match self.client.fetch(true).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch leaderboard data, checkpoint untouched");
                return CycleReport::fetch_failed(e.to_string());
            }
        };

        let stored = self.checkpoints.read().await;
        let previous = state
            .unsaved_checkpoint
            .map_or(stored, |unsaved| unsaved.max(stored));

        let achievements = diff(&snapshot, previous);
        let chunks = match achievements.is_empty() {
            true => {
                tracing::info!("no new achievements found");
                Vec::new()
            }
            false => {
                tracing::info!(count = achievements.len(), "found new achievements");
                self.dispatch_all(&achievements).await
            }
        };

        // stars earned after the fetch aren't in this snapshot, so they stay ahead of the checkpoint
        let now = snapshot.fetched_at;
        match self.checkpoints.write(now).await {
            Ok(()) => state.unsaved_checkpoint = None,
            Err(e) => {
                tracing::error!(error = ?e, checkpoint = now, "unable to persist checkpoint, holding it in memory");
                state.unsaved_checkpoint = Some(now);
            }
        }
        self.last_check.store(now, Ordering::SeqCst);

        CycleReport {
            fetched: true,
            error: None,
            previous_checkpoint: Some(previous),
            checkpoint: Some(now),
            achievements,
            chunks,
        }
    }

    /// Sends announcements in order; a failed chunk is logged and the rest still go out
    async fn dispatch_all(&self, achievements: &[Achievement]) -> Vec<ChunkReport> {
        let messages: Vec<String> = achievements.iter().map(Achievement::message).collect();
        let mut reports = Vec::new();

        for text in chunk_messages(&messages, self.settings.message_budget) {
            let len = text.chars().count();
            let outcome = match self.dispatcher.dispatch(&self.settings.channel, &text).await {
                Ok(delivery) => {
                    tracing::info!(len, ?delivery, "dispatched message chunk");
                    ChunkOutcome::from(delivery)
                }
                Err(e) => {
                    tracing::error!(len, error = %e, "failed to dispatch message chunk");
                    ChunkOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            reports.push(ChunkReport { text, outcome });
        }

        reports
    }

    /// Rendered leaderboard for on-demand requests. Reads through the cache and never moves the
    /// checkpoint.
    #[instrument(skip(self))]
    pub async fn summary(&self) -> FetchResult<String> {
        let _guard = self.summary.lock().await;
        let snapshot = self.client.fetch(false).await?;

        let year = self.settings.year;
        let day_limit = puzzle_day(year, self.clock.now());

        Ok(render(&snapshot, year, day_limit))
    }

    pub fn status(&self) -> Status {
        Status {
            online: true,
            cycle_running: self.cycle.try_lock().is_err(),
            last_check: self.last_check.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub online: bool,
    pub cycle_running: bool,
    pub last_check: i64,
}

/// Outcome of one check cycle, also returned verbatim by the on-demand check
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub fetched: bool,
    pub error: Option<String>,
    pub previous_checkpoint: Option<i64>,
    pub checkpoint: Option<i64>,
    pub achievements: Vec<Achievement>,
    pub chunks: Vec<ChunkReport>,
}

impl CycleReport {
    fn fetch_failed(error: String) -> Self {
        Self {
            fetched: false,
            error: Some(error),
            previous_checkpoint: None,
            checkpoint: None,
            achievements: Vec::new(),
            chunks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    pub text: String,
    pub outcome: ChunkOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChunkOutcome {
    Delivered,
    Simulated,
    Failed { error: String },
}

impl From<Delivery> for ChunkOutcome {
    fn from(value: Delivery) -> Self {
        match value {
            Delivery::Delivered => ChunkOutcome::Delivered,
            Delivery::Simulated => ChunkOutcome::Simulated,
        }
    }
}
